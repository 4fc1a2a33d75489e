use std::io::{self, BufRead};

/// Yields one logical line per transport line, without the trailing `\r\n` or `\n`.
///
/// Bytes that are not valid UTF-8 are replaced rather than failing the feed.
pub struct RawLines<R: BufRead> {
    read: R,
    buf: Vec<u8>,
}

impl<R: BufRead> RawLines<R> {
    pub fn new(read: R) -> Self {
        RawLines {
            read,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for RawLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.read.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                }
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Joins folded lines: a line starting with a space or tab continues the previous one.
///
/// See <https://tools.ietf.org/html/rfc5545#section-3.1>
pub struct UnfoldedLines<R: BufRead> {
    lines: RawLines<R>,
    pending: Option<String>,
}

impl<R: BufRead> UnfoldedLines<R> {
    pub fn new(read: R) -> Self {
        UnfoldedLines {
            lines: RawLines::new(read),
            pending: None,
        }
    }
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

impl<R: BufRead> Iterator for UnfoldedLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = match self.pending.take() {
            Some(line) => line,
            None => match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            },
        };
        loop {
            match self.lines.next() {
                None => return Some(Ok(line)),
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(next)) if is_continuation(&next) => line.push_str(&next[1..]),
                Some(Ok(next)) => {
                    self.pending = Some(next);
                    return Some(Ok(line));
                }
            }
        }
    }
}

/// Picks the tokenizer for a feed body.
pub fn logical_lines<'a, R: BufRead + 'a>(
    read: R,
    unfold: bool,
) -> Box<dyn Iterator<Item = io::Result<String>> + 'a> {
    if unfold {
        Box::new(UnfoldedLines::new(read))
    } else {
        Box::new(RawLines::new(read))
    }
}
