//! Praat TextGrid annotation files
//!
//! Both text flavours Praat writes are accepted: the long format with
//! `key = value` lines and the short format with bare values. The reader works
//! on the value tokens alone (strings, numbers and `<exists>` flags), so keys,
//! item indices and comments never matter.
//!
//! ```text
//! File type = "ooTextFile"
//! Object class = "TextGrid"
//!
//! xmin = 0
//! xmax = 1.5
//! tiers? <exists>
//! size = 1
//! item []:
//!     item [1]:
//!         class = "IntervalTier"
//!         name = "vowels"
//!         ...
//! ```

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::{Result, VowelError};

/// Largest tier or item count accepted from a file
const MAX_COUNT: f64 = 1e7;

/// A labelled time span on an interval tier
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

impl Interval {
    /// Centre of the interval, always within `[start, end]`
    pub fn midpoint(&self) -> f64 {
        let mid = (self.start + self.end) / 2.0;
        mid.max(self.start).min(self.end)
    }

    /// Label without surrounding whitespace
    pub fn trimmed_label(&self) -> &str {
        self.label.trim()
    }

    /// Intervals with an empty (or whitespace-only) label mark silence
    pub fn is_silence(&self) -> bool {
        self.trimmed_label().is_empty()
    }
}

/// A tier of consecutive, non-overlapping intervals
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalTier {
    pub name: String,
    pub xmin: f64,
    pub xmax: f64,
    pub intervals: Vec<Interval>,
}

impl IntervalTier {
    /// Intervals that carry a label, in time order
    pub fn labelled(&self) -> impl Iterator<Item = &Interval> + '_ {
        self.intervals.iter().filter(|interval| !interval.is_silence())
    }
}

/// A time-stamped mark on a point tier
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: f64,
    pub mark: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointTier {
    pub name: String,
    pub xmin: f64,
    pub xmax: f64,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tier {
    Interval(IntervalTier),
    Point(PointTier),
}

impl Tier {
    pub fn name(&self) -> &str {
        match self {
            Tier::Interval(tier) => &tier.name,
            Tier::Point(tier) => &tier.name,
        }
    }
}

/// Time-aligned annotation with any number of named tiers
#[derive(Debug, Clone, PartialEq)]
pub struct TextGrid {
    pub xmin: f64,
    pub xmax: f64,
    pub tiers: Vec<Tier>,
}

impl TextGrid {
    /// Read a TextGrid from disk (UTF-8, or UTF-16 with a byte order mark)
    ///
    /// # Errors
    /// `FileNotFound` if the path does not exist, `TextGrid` if the contents
    /// are not a text TextGrid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VowelError::FileNotFound {
                kind: "annotation",
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        decode_text(&bytes)?.parse()
    }

    /// Names of all tiers, in file order
    pub fn tier_names(&self) -> Vec<String> {
        self.tiers.iter().map(|tier| tier.name().to_string()).collect()
    }

    /// The first interval tier called `name`
    pub fn interval_tier(&self, name: &str) -> Result<&IntervalTier> {
        let mut found_point_tier = false;
        for tier in &self.tiers {
            match tier {
                Tier::Interval(tier) if tier.name == name => return Ok(tier),
                Tier::Point(tier) if tier.name == name => found_point_tier = true,
                _ => {}
            }
        }
        if found_point_tier {
            Err(VowelError::NotAnIntervalTier(name.to_string()))
        } else {
            Err(VowelError::TierNotFound {
                name: name.to_string(),
                available: self.tier_names(),
            })
        }
    }

    /// Serialize in Praat's long text format
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_long(&mut out);
        out
    }

    /// Write the long text format to `path` as UTF-8
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    fn write_long(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "File type = \"ooTextFile\"")?;
        writeln!(out, "Object class = \"TextGrid\"")?;
        writeln!(out)?;
        writeln!(out, "xmin = {} ", self.xmin)?;
        writeln!(out, "xmax = {} ", self.xmax)?;
        if self.tiers.is_empty() {
            return writeln!(out, "tiers? <absent> ");
        }
        writeln!(out, "tiers? <exists> ")?;
        writeln!(out, "size = {} ", self.tiers.len())?;
        writeln!(out, "item []: ")?;
        for (i, tier) in self.tiers.iter().enumerate() {
            writeln!(out, "    item [{}]:", i + 1)?;
            match tier {
                Tier::Interval(tier) => {
                    writeln!(out, "        class = \"IntervalTier\" ")?;
                    writeln!(out, "        name = {} ", quote(&tier.name))?;
                    writeln!(out, "        xmin = {} ", tier.xmin)?;
                    writeln!(out, "        xmax = {} ", tier.xmax)?;
                    writeln!(out, "        intervals: size = {} ", tier.intervals.len())?;
                    for (j, interval) in tier.intervals.iter().enumerate() {
                        writeln!(out, "        intervals [{}]:", j + 1)?;
                        writeln!(out, "            xmin = {} ", interval.start)?;
                        writeln!(out, "            xmax = {} ", interval.end)?;
                        writeln!(out, "            text = {} ", quote(&interval.label))?;
                    }
                }
                Tier::Point(tier) => {
                    writeln!(out, "        class = \"TextTier\" ")?;
                    writeln!(out, "        name = {} ", quote(&tier.name))?;
                    writeln!(out, "        xmin = {} ", tier.xmin)?;
                    writeln!(out, "        xmax = {} ", tier.xmax)?;
                    writeln!(out, "        points: size = {} ", tier.points.len())?;
                    for (j, point) in tier.points.iter().enumerate() {
                        writeln!(out, "        points [{}]:", j + 1)?;
                        writeln!(out, "            number = {} ", point.time)?;
                        writeln!(out, "            mark = {} ", quote(&point.mark))?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl FromStr for TextGrid {
    type Err = VowelError;

    fn from_str(text: &str) -> Result<Self> {
        let mut tokens = Tokens::new(text);

        let file_type = tokens.string()?;
        if !file_type.starts_with("ooTextFile") {
            return Err(tokens.error(format!(
                "unsupported file type \"{file_type}\" (only text TextGrids can be read)"
            )));
        }
        let class = tokens.string()?;
        if class != "TextGrid" {
            return Err(tokens.error(format!("expected a TextGrid, found \"{class}\"")));
        }

        let xmin = tokens.number()?;
        let xmax = tokens.number()?;
        if !tokens.flag()? {
            return Ok(TextGrid { xmin, xmax, tiers: Vec::new() });
        }

        let num_tiers = tokens.count()?;
        let mut tiers = Vec::new();
        for _ in 0..num_tiers {
            let class = tokens.string()?;
            let name = tokens.string()?;
            let tier_xmin = tokens.number()?;
            let tier_xmax = tokens.number()?;
            let size = tokens.count()?;

            let tier = match class.as_str() {
                "IntervalTier" => {
                    let mut intervals = Vec::new();
                    for _ in 0..size {
                        let start = tokens.number()?;
                        let end = tokens.number()?;
                        let label = tokens.string()?;
                        if end < start {
                            return Err(tokens.error(format!(
                                "interval on tier \"{name}\" ends ({end}) before it starts ({start})"
                            )));
                        }
                        intervals.push(Interval { start, end, label });
                    }
                    Tier::Interval(IntervalTier {
                        name,
                        xmin: tier_xmin,
                        xmax: tier_xmax,
                        intervals,
                    })
                }
                "TextTier" | "PointTier" => {
                    let mut points = Vec::new();
                    for _ in 0..size {
                        let time = tokens.number()?;
                        let mark = tokens.string()?;
                        points.push(Point { time, mark });
                    }
                    Tier::Point(PointTier {
                        name,
                        xmin: tier_xmin,
                        xmax: tier_xmax,
                        points,
                    })
                }
                other => return Err(tokens.error(format!("unknown tier class \"{other}\""))),
            };
            tiers.push(tier);
        }

        log::debug!(
            "parsed TextGrid with tiers [{}]",
            tiers.iter().map(Tier::name).collect::<Vec<_>>().join(", ")
        );
        Ok(TextGrid { xmin, xmax, tiers })
    }
}

/// Quote a label the way Praat does, doubling embedded quotes
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Decode file contents: UTF-16 with BOM, UTF-8 (BOM optional), else Latin-1
fn decode_text(bytes: &[u8]) -> Result<String> {
    let utf16 = |big_endian: bool| -> Result<String> {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| {
                if big_endian {
                    u16::from_be_bytes([pair[0], pair[1]])
                } else {
                    u16::from_le_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16(&units).map_err(|e| VowelError::TextGrid {
            line: 0,
            message: format!("invalid UTF-16: {e}"),
        })
    };

    match bytes {
        [0xFF, 0xFE, ..] => utf16(false),
        [0xFE, 0xFF, ..] => utf16(true),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec()).map_err(|e| {
            VowelError::TextGrid {
                line: 0,
                message: format!("invalid UTF-8: {e}"),
            }
        }),
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => {
                log::debug!("TextGrid is not valid UTF-8; reading it as Latin-1");
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(f64),
    Flag(bool),
}

/// Value tokens of a TextGrid, skipping keys, brackets and comments
struct Tokens<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: String) -> VowelError {
        VowelError::TextGrid { line: self.line, message }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_while(&mut self, keep_going: impl Fn(char) -> bool) {
        while let Some(&c) = self.chars.peek() {
            if !keep_going(c) {
                break;
            }
            self.bump();
        }
    }

    fn take_while(&mut self, keep_going: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if !keep_going(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            let Some(&c) = self.chars.peek() else {
                return Ok(None);
            };
            match c {
                '"' => {
                    self.bump();
                    return self.quoted().map(|s| Some(Token::Str(s)));
                }
                '<' => {
                    self.bump();
                    let word = self.take_while(|c| c != '>' && c != '\n');
                    if self.bump() != Some('>') {
                        return Err(self.error(format!("unterminated flag <{word}")));
                    }
                    return match word.as_str() {
                        "exists" => Ok(Some(Token::Flag(true))),
                        "absent" => Ok(Some(Token::Flag(false))),
                        other => Err(self.error(format!("unknown flag <{other}>"))),
                    };
                }
                '[' => self.skip_while(|c| c != ']'),
                '!' => self.skip_while(|c| c != '\n'),
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                    let word = self.take_while(|c| !c.is_whitespace());
                    return word
                        .parse::<f64>()
                        .map(|n| Some(Token::Num(n)))
                        .map_err(|_| self.error(format!("invalid number \"{word}\"")));
                }
                c if c.is_alphabetic() || c == '_' => {
                    // key such as `xmin`, `intervals` or `tiers?`
                    self.skip_while(|c| c.is_alphanumeric() || c == '_' || c == '?');
                    continue;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Body of a quoted string; `""` stands for one quote
    fn quoted(&mut self) -> Result<String> {
        let start_line = self.line;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => {
                    if self.chars.peek() == Some(&'"') {
                        self.bump();
                        out.push('"');
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
                None => {
                    return Err(VowelError::TextGrid {
                        line: start_line,
                        message: "unterminated string".to_string(),
                    })
                }
            }
        }
    }

    fn expect(&mut self, what: &str) -> Result<Token> {
        self.next_token()?
            .ok_or_else(|| self.error(format!("unexpected end of file, expected {what}")))
    }

    fn string(&mut self) -> Result<String> {
        match self.expect("a string")? {
            Token::Str(s) => Ok(s),
            other => Err(self.error(format!("expected a string, found {other:?}"))),
        }
    }

    fn number(&mut self) -> Result<f64> {
        match self.expect("a number")? {
            Token::Num(n) => Ok(n),
            other => Err(self.error(format!("expected a number, found {other:?}"))),
        }
    }

    fn count(&mut self) -> Result<usize> {
        let n = self.number()?;
        if !(0.0..=MAX_COUNT).contains(&n) || n.fract() != 0.0 {
            return Err(self.error(format!("expected a count, found {n}")));
        }
        Ok(n as usize)
    }

    fn flag(&mut self) -> Result<bool> {
        match self.expect("<exists> or <absent>")? {
            Token::Flag(b) => Ok(b),
            other => Err(self.error(format!("expected <exists> or <absent>, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LONG: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 1.5
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "words"
        xmin = 0
        xmax = 1.5
        intervals: size = 1
        intervals [1]:
            xmin = 0
            xmax = 1.5
            text = "bad ""bed"""
    item [2]:
        class = "IntervalTier"
        name = "vowels"
        xmin = 0
        xmax = 1.5
        intervals: size = 4
        intervals [1]:
            xmin = 0
            xmax = 0.4
            text = ""
        intervals [2]:
            xmin = 0.4
            xmax = 0.6
            text = "æ"
        intervals [3]:
            xmin = 0.6
            xmax = 1.1
            text = "   "
        intervals [4]:
            xmin = 1.1
            xmax = 1.5
            text = " ɛ "
"#;

    const SHORT: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

0
1.5
<exists>
2
"IntervalTier"
"vowels"
0
1.5
2
0
0.75
"æ"
0.75
1.5
""
"TextTier"
"bursts"
0
1.5
1
0.3
"b"
"#;

    #[test]
    fn test_parse_long_format() {
        let grid: TextGrid = LONG.parse().unwrap();
        assert_eq!(grid.tier_names(), vec!["words", "vowels"]);
        assert_relative_eq!(grid.xmax, 1.5);

        let words = grid.interval_tier("words").unwrap();
        assert_eq!(words.intervals[0].label, "bad \"bed\"");

        let vowels = grid.interval_tier("vowels").unwrap();
        assert_eq!(vowels.intervals.len(), 4);
        let labels: Vec<&str> = vowels.labelled().map(Interval::trimmed_label).collect();
        assert_eq!(labels, vec!["æ", "ɛ"]);
    }

    #[test]
    fn test_parse_short_format() {
        let grid: TextGrid = SHORT.parse().unwrap();
        let vowels = grid.interval_tier("vowels").unwrap();
        assert_eq!(vowels.labelled().count(), 1);
        assert_relative_eq!(vowels.intervals[0].midpoint(), 0.375);

        match &grid.tiers[1] {
            Tier::Point(tier) => {
                assert_eq!(tier.points.len(), 1);
                assert_eq!(tier.points[0].mark, "b");
            }
            other => panic!("expected point tier, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_tier_lists_available() {
        let grid: TextGrid = LONG.parse().unwrap();
        match grid.interval_tier("phones") {
            Err(VowelError::TierNotFound { name, available }) => {
                assert_eq!(name, "phones");
                assert_eq!(available, vec!["words", "vowels"]);
            }
            other => panic!("expected TierNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_point_tier_is_not_interval_tier() {
        let grid: TextGrid = SHORT.parse().unwrap();
        assert!(matches!(
            grid.interval_tier("bursts"),
            Err(VowelError::NotAnIntervalTier(_))
        ));
    }

    #[test]
    fn test_midpoint_within_interval() {
        for (start, end) in [(0.0, 0.0), (0.1, 0.3), (1.0, 1.0 + 1e-12), (12.345, 99.9)] {
            let interval = Interval { start, end, label: "a".into() };
            let mid = interval.midpoint();
            assert!(start <= mid && mid <= end);
        }
    }

    #[test]
    fn test_written_text_parses_back() {
        let grid: TextGrid = LONG.parse().unwrap();
        let reparsed: TextGrid = grid.to_text().parse().unwrap();
        assert_eq!(grid, reparsed);
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in SHORT.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let grid: TextGrid = decode_text(&bytes).unwrap().parse().unwrap();
        assert_eq!(grid.tier_names(), vec!["vowels", "bursts"]);
    }

    #[test]
    fn test_truncated_file_reports_error() {
        let truncated = &SHORT[..SHORT.find("\"æ\"").unwrap()];
        assert!(matches!(
            truncated.parse::<TextGrid>(),
            Err(VowelError::TextGrid { .. })
        ));
    }

    #[test]
    fn test_oversized_counts_rejected() {
        let header = "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\n0\n1\n<exists>\n";
        for count in ["1e30", "1e12", "-1", "2.5"] {
            let text = format!("{header}{count}\n");
            assert!(
                matches!(text.parse::<TextGrid>(), Err(VowelError::TextGrid { .. })),
                "tier count {count}"
            );
        }

        // A plausible interval count with too few intervals runs out of tokens
        let text = format!("{header}1\n\"IntervalTier\"\n\"vowels\"\n0\n1\n1e6\n0\n1\n\"a\"\n");
        assert!(matches!(text.parse::<TextGrid>(), Err(VowelError::TextGrid { .. })));
    }

    #[test]
    fn test_binary_textgrid_rejected() {
        let text = "File type = \"ooBinaryFile\"\nObject class = \"TextGrid\"\n";
        assert!(text.parse::<TextGrid>().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TextGrid::from_file("/nonexistent/speaker.TextGrid"),
            Err(VowelError::FileNotFound { kind: "annotation", .. })
        ));
    }
}
