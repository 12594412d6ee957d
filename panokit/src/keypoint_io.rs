use std::fmt;
use std::io::{self, BufRead, Write};

use crate::keypoint::KeyPoint;

/// Trailing file line naming the source image.
#[derive(Clone, Debug, PartialEq)]
pub struct Footer {
    pub filename: String,
    pub width: usize,
    pub height: usize,
}

/// Contents of a keypoint text file.
pub struct KeyPointFile {
    pub keypoints: Vec<KeyPoint>,
    pub descriptor_length: usize,
    /// `None` when the file ends right after the keypoint lines.
    pub footer: Option<Footer>,
}

#[derive(Debug)]
pub enum KeyPointIoError {
    Io(io::Error),
    Malformed { line: usize, message: String },
}

impl fmt::Display for KeyPointIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPointIoError::Io(err) => write!(f, "i/o error: {}", err),
            KeyPointIoError::Malformed { line, message } => {
                write!(f, "malformed keypoint file (line {}): {}", line, message)
            }
        }
    }
}

impl std::error::Error for KeyPointIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyPointIoError::Io(err) => Some(err),
            KeyPointIoError::Malformed { .. } => None,
        }
    }
}

impl From<io::Error> for KeyPointIoError {
    fn from(err: io::Error) -> Self {
        KeyPointIoError::Io(err)
    }
}

/// Writes keypoints in the text format:
/// a `count dims` header, one `y x scale orientation score d0..dN` line
/// per keypoint, and a `filename width height` footer.
pub fn write_keypoints<W: Write>(
    writer: &mut W,
    keypoints: &[KeyPoint],
    descriptor_length: usize,
    image_name: &str,
    image_width: usize,
    image_height: usize,
) -> io::Result<()> {
    writeln!(writer, "{} {}", keypoints.len(), descriptor_length)?;
    for kp in keypoints {
        write!(
            writer,
            "{} {} {} {} {}",
            kp.y, kp.x, kp.scale, kp.orientation, kp.score
        )?;
        for d in &kp.descriptor {
            write!(writer, " {}", d)?;
        }
        writeln!(writer)?;
    }
    writeln!(writer, "{} {} {}", image_name, image_width, image_height)?;
    Ok(())
}

fn parse_number(token: &str, line: usize) -> Result<f64, KeyPointIoError> {
    token.parse().map_err(|_| KeyPointIoError::Malformed {
        line,
        message: format!("expected a number, found {:?}", token),
    })
}

fn next_nonempty<R: BufRead>(
    lines: &mut io::Lines<R>,
    line_no: &mut usize,
) -> Result<Option<String>, KeyPointIoError> {
    for line in lines.by_ref() {
        let line = line?;
        *line_no += 1;
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

/// Reads a keypoint file written by [write_keypoints].
///
/// A missing footer is tolerated; everything else must match the header.
pub fn read_keypoints<R: BufRead>(reader: R) -> Result<KeyPointFile, KeyPointIoError> {
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    let header = next_nonempty(&mut lines, &mut line_no)?.ok_or(KeyPointIoError::Malformed {
        line: 1,
        message: "missing header".to_string(),
    })?;
    let header_line = line_no;
    let mut tokens = header.split_whitespace();
    let count = parse_number(
        tokens.next().unwrap_or(""),
        header_line,
    )? as usize;
    let descriptor_length = parse_number(
        tokens.next().unwrap_or(""),
        header_line,
    )? as usize;

    let mut keypoints = Vec::new();
    for _ in 0..count {
        let line = next_nonempty(&mut lines, &mut line_no)?.ok_or(KeyPointIoError::Malformed {
            line: line_no + 1,
            message: format!("expected {} keypoint lines", count),
        })?;
        let here = line_no;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 5 + descriptor_length {
            return Err(KeyPointIoError::Malformed {
                line: here,
                message: format!(
                    "expected {} values, found {}",
                    5 + descriptor_length,
                    tokens.len()
                ),
            });
        }
        let y = parse_number(tokens[0], here)?;
        let x = parse_number(tokens[1], here)?;
        let scale = parse_number(tokens[2], here)?;
        let orientation = parse_number(tokens[3], here)?;
        let score = parse_number(tokens[4], here)?;
        let mut kp = KeyPoint::new(x, y, scale, score, 0);
        kp.orientation = orientation;
        kp.descriptor = tokens[5..]
            .iter()
            .map(|t| parse_number(t, here))
            .collect::<Result<Vec<f64>, KeyPointIoError>>()?;
        keypoints.push(kp);
    }

    let footer = match next_nonempty(&mut lines, &mut line_no)? {
        Some(line) => {
            let here = line_no;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 {
                return Err(KeyPointIoError::Malformed {
                    line: here,
                    message: "footer needs filename, width and height".to_string(),
                });
            }
            let width = parse_number(tokens[tokens.len() - 2], here)? as usize;
            let height = parse_number(tokens[tokens.len() - 1], here)? as usize;
            Some(Footer {
                filename: tokens[..tokens.len() - 2].join(" "),
                width,
                height,
            })
        }
        None => None,
    };

    Ok(KeyPointFile {
        keypoints,
        descriptor_length,
        footer,
    })
}
