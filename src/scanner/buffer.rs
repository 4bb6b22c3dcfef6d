//! Multi-line SQL accumulation.
//!
//! SQL can span lines in three containers: `.sql` statements terminated by a
//! semicolon, backtick strings (Go/JS/TS), and triple-quote strings
//! (Python/Java). The buffer collects the lines, normalizes whitespace, and
//! yields a single-line statement attributed to the opening line.

/// The type of multi-line block currently being buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BlockKind {
    #[default]
    None,
    /// .sql file: accumulate until a semicolon.
    Sql,
    /// Go/JS/TS backtick string literal.
    Backtick,
    /// Python/Java triple-quote string.
    TripleQuote,
}

/// A completed multi-line SQL string with its origin line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BufferedStatement {
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Default)]
pub(crate) struct SqlBuffer {
    kind: BlockKind,
    lines: Vec<String>,
    start_line: u32,
}

const BACKTICK_EXTS: &[&str] = &["go", "js", "ts", "jsx", "tsx"];
const TRIPLE_QUOTE_EXTS: &[&str] = &["py", "java"];

impl SqlBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> bool {
        self.kind != BlockKind::None
    }

    fn reset(&mut self) {
        self.kind = BlockKind::None;
        self.lines.clear();
        self.start_line = 0;
    }

    /// Process a line from a `.sql` file. Returns completed statements when
    /// semicolons are encountered.
    pub fn feed_sql(&mut self, line_num: u32, line: &str) -> Vec<BufferedStatement> {
        if self.lines.is_empty() {
            self.start_line = line_num;
            self.kind = BlockKind::Sql;
        }

        let parts = split_on_semicolons(line);

        if parts.len() == 1 {
            // No semicolon, keep buffering
            self.lines.push(line.to_string());
            return Vec::new();
        }

        let mut results = Vec::new();
        let last = parts.len() - 1;
        for (i, part) in parts.into_iter().enumerate() {
            if i < last {
                // Part before a semicolon completes the statement
                self.lines.push(part);
                let text = normalize(&self.lines);
                if !text.is_empty() {
                    results.push(BufferedStatement {
                        text,
                        line: self.start_line,
                    });
                }
                self.lines.clear();
                self.start_line = line_num;
            } else {
                // After the last semicolon: start of the next statement
                if part.trim().is_empty() {
                    self.lines.clear();
                    self.kind = BlockKind::None;
                } else {
                    self.lines = vec![part];
                    self.start_line = line_num;
                }
            }
        }

        results
    }

    /// Process a line from a code file. Returns a completed statement when a
    /// multi-line string block closes, and whether the line was buffered.
    pub fn feed_code(
        &mut self,
        line_num: u32,
        line: &str,
        ext: &str,
    ) -> (Option<BufferedStatement>, bool) {
        if self.active() {
            self.lines.push(line.to_string());

            let closed = match self.kind {
                BlockKind::Backtick if contains_backtick(line) => {
                    Some(trim_at_backtick(&normalize(&self.lines)))
                }
                BlockKind::TripleQuote if contains_triple_quote(line) => {
                    Some(trim_at_triple_quote(&normalize(&self.lines)))
                }
                _ => None,
            };

            if let Some(text) = closed {
                let stmt = BufferedStatement {
                    text,
                    line: self.start_line,
                };
                self.reset();
                return (Some(stmt), true);
            }
            return (None, true);
        }

        if BACKTICK_EXTS.contains(&ext) && opens_backtick_block(line) {
            self.kind = BlockKind::Backtick;
            self.start_line = line_num;
            self.lines = vec![extract_after_backtick(line)];
            return (None, true);
        }

        if TRIPLE_QUOTE_EXTS.contains(&ext) && opens_triple_quote_block(line) {
            self.kind = BlockKind::TripleQuote;
            self.start_line = line_num;
            self.lines = vec![extract_after_triple_quote(line)];
            return (None, true);
        }

        (None, false)
    }

    /// Flush any remaining buffered content as one final statement.
    pub fn flush(&mut self) -> Option<BufferedStatement> {
        if self.lines.is_empty() {
            return None;
        }
        let text = normalize(&self.lines);
        let line = self.start_line;
        self.reset();
        if text.is_empty() {
            return None;
        }
        Some(BufferedStatement { text, line })
    }
}

/// Join lines and collapse whitespace runs to a single space.
fn normalize(lines: &[String]) -> String {
    let joined = lines.join(" ");
    let mut out = String::with_capacity(joined.len());
    let mut prev_space = false;
    for ch in joined.chars() {
        if matches!(ch, ' ' | '\t' | '\n' | '\r') {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
            continue;
        }
        out.push(ch);
        prev_space = false;
    }
    out.trim().to_string()
}

/// Split on `;` outside single-quoted strings, treating `''` as an escaped
/// quote.
fn split_on_semicolons(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                if in_quote && chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push_str("''");
                    continue;
                }
                in_quote = !in_quote;
                current.push('\'');
            }
            ';' if !in_quote => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// True when the line has an odd number of unescaped backticks, meaning one
/// is unclosed.
fn opens_backtick_block(line: &str) -> bool {
    unescaped_backtick_count(line) % 2 == 1
}

fn unescaped_backtick_count(line: &str) -> usize {
    let bytes = line.as_bytes();
    let mut count = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'`' && (i == 0 || bytes[i - 1] != b'\\') {
            count += 1;
        }
    }
    count
}

fn contains_backtick(line: &str) -> bool {
    unescaped_backtick_count(line) > 0
}

fn opens_triple_quote_block(line: &str) -> bool {
    for delim in ["\"\"\"", "'''"] {
        if let Some(idx) = line.find(delim) {
            let rest = &line[idx + 3..];
            if !rest.contains(delim) {
                return true;
            }
        }
    }
    false
}

fn contains_triple_quote(line: &str) -> bool {
    line.contains("\"\"\"") || line.contains("'''")
}

/// Everything after the first unescaped backtick.
fn extract_after_backtick(line: &str) -> String {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'`' && (i == 0 || bytes[i - 1] != b'\\') {
            return line[i + 1..].to_string();
        }
    }
    line.to_string()
}

fn extract_after_triple_quote(line: &str) -> String {
    for delim in ["\"\"\"", "'''"] {
        if let Some(idx) = line.find(delim) {
            return line[idx + 3..].to_string();
        }
    }
    line.to_string()
}

/// Truncate at the first unescaped backtick.
fn trim_at_backtick(text: &str) -> String {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'`' && (i == 0 || bytes[i - 1] != b'\\') {
            return text[..i].to_string();
        }
    }
    text.to_string()
}

fn trim_at_triple_quote(text: &str) -> String {
    for delim in ["\"\"\"", "'''"] {
        if let Some(idx) = text.find(delim) {
            return text[..idx].to_string();
        }
    }
    text.to_string()
}
