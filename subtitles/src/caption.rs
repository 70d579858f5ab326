use std::io::{self, BufRead, Write};

pub const CAPTION_HEADER: &str = "WEBVTT";

fn is_cue_index(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

fn is_timing_line(line: &str) -> bool {
    line.contains("-->")
}

/// Line-oriented SRT to WebVTT rewriter. Cue numbers are dropped and
/// timestamps switch to a `.` millisecond separator.
struct CueWriter<W: Write> {
    output: W,
    /// A numeric line is only a cue index when a timing line follows it
    pending_index: Option<String>,
    seen_content: bool,
}

impl<W: Write> CueWriter<W> {
    fn new(output: W) -> Self {
        Self {
            output,
            pending_index: None,
            seen_content: false,
        }
    }

    fn push(&mut self, line: &str) -> io::Result<()> {
        let line = if self.seen_content {
            line
        } else {
            line.trim_start_matches('\u{feff}')
        };

        // An existing header is replaced by ours
        if !self.seen_content {
            if line.trim().is_empty() {
                return Ok(());
            }
            self.seen_content = true;
            if line.trim_start().to_ascii_uppercase().starts_with(CAPTION_HEADER) {
                return Ok(());
            }
        }

        if is_timing_line(line) {
            self.pending_index = None;
            return writeln!(self.output, "{}", line.replace(',', "."));
        }

        if let Some(index) = self.pending_index.take() {
            writeln!(self.output, "{index}")?;
        }

        if is_cue_index(line) {
            self.pending_index = Some(line.to_string());
            return Ok(());
        }

        writeln!(self.output, "{line}")
    }

    fn finish(mut self) -> io::Result<W> {
        if let Some(index) = self.pending_index.take() {
            writeln!(self.output, "{index}")?;
        }
        Ok(self.output)
    }
}

/// Streams line-timed subtitle text from `input` into `output` as a caption track body
pub fn convert(input: impl BufRead, output: impl Write) -> io::Result<()> {
    let mut writer = CueWriter::new(output);
    writeln!(writer.output, "{CAPTION_HEADER}\n")?;
    for line in input.split(b'\n') {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        writer.push(line.trim_end_matches('\r'))?;
    }
    writer.finish()?.flush()
}

/// Converts UTF-8 line-timed subtitle text into a caption track
pub fn to_caption_track(utf8: &[u8]) -> Vec<u8> {
    let mut track = Vec::with_capacity(utf8.len() + CAPTION_HEADER.len() + 2);
    // Writing into a Vec cannot fail
    let _ = convert(utf8, &mut track);
    ensure_header(&track)
}

/// Guarantees the track starts with exactly `WEBVTT\n\n`, whatever header
/// (or lack of one) it came with. Line endings become `\n`.
pub fn ensure_header(track: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(track);
    let text = text.trim_start_matches('\u{feff}');
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let (first_line, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));
    let body = if first_line
        .trim()
        .to_ascii_uppercase()
        .starts_with(CAPTION_HEADER)
    {
        rest.trim_start_matches('\n')
    } else {
        text.as_str()
    };

    let mut normalized = String::with_capacity(body.len() + CAPTION_HEADER.len() + 2);
    normalized.push_str(CAPTION_HEADER);
    normalized.push_str("\n\n");
    normalized.push_str(body);
    normalized.into_bytes()
}
