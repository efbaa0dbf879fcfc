//! Line protocol spoken by the posture detector on stdin.
//!
//! One event per line:
//!
//! ```text
//! <seconds>              bad-posture duration sample
//! activity <name|unset>  the user switched activity
//! baseline               the good-posture reference was captured
//! close                  end the session
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fmt;

use slouch_core::Activity;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// A single event from the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Seconds of consecutive bad posture; 0 means posture is good.
    Sample(u64),
    /// Activity selection changed.
    Activity(Option<Activity>),
    Baseline,
    Close,
}

/// A line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInputError {
    line: String,
}

impl fmt::Display for ParseInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized input line: {:?}", self.line)
    }
}

impl std::error::Error for ParseInputError {}

/// Parses one protocol line. Returns `Ok(None)` for blank and comment lines.
///
/// An unknown activity name is not an error: it is logged and treated as
/// unset so the session keeps accounting.
pub fn parse_line(line: &str) -> Result<Option<Input>, ParseInputError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let (Some(head), rest) = (words.next(), words.next()) else {
        return Ok(None);
    };
    if words.next().is_some() {
        return Err(ParseInputError {
            line: line.to_string(),
        });
    }

    let input = match (head, rest) {
        ("baseline", None) => Input::Baseline,
        ("close", None) => Input::Close,
        ("activity", None) => Input::Activity(None),
        ("activity", Some(name)) => match Activity::parse_optional(name) {
            Ok(activity) => Input::Activity(activity),
            Err(e) => {
                tracing::warn!(error = %e, "treating activity as unset");
                Input::Activity(None)
            }
        },
        (sample, None) => sample.parse().map(Input::Sample).map_err(|_| ParseInputError {
            line: line.to_string(),
        })?,
        _ => {
            return Err(ParseInputError {
                line: line.to_string(),
            });
        }
    };
    Ok(Some(input))
}

/// Reads protocol lines until EOF and forwards parsed events.
///
/// Malformed lines are logged and skipped. The sender is dropped on EOF,
/// which the session driver treats as a close.
pub async fn read_inputs<R>(reader: R, tx: mpsc::Sender<Input>)
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(Some(input)) => {
                    if tx.send(input).await.is_err() {
                        tracing::debug!("session ended, stopping input reader");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "skipping input"),
            },
            Ok(None) => {
                tracing::debug!("input closed");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_event_kind() {
        assert_eq!(parse_line("42").unwrap(), Some(Input::Sample(42)));
        assert_eq!(parse_line("0").unwrap(), Some(Input::Sample(0)));
        assert_eq!(parse_line("baseline").unwrap(), Some(Input::Baseline));
        assert_eq!(parse_line("close").unwrap(), Some(Input::Close));
        assert_eq!(
            parse_line("activity work").unwrap(),
            Some(Input::Activity(Some(Activity::Work)))
        );
        assert_eq!(
            parse_line("activity unset").unwrap(),
            Some(Input::Activity(None))
        );
    }

    #[test]
    fn ignores_blank_and_comment_lines() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# detector v2").unwrap(), None);
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(parse_line("  7 \r").unwrap(), Some(Input::Sample(7)));
        assert_eq!(
            parse_line("activity   study").unwrap(),
            Some(Input::Activity(Some(Activity::Study)))
        );
    }

    #[test]
    fn unknown_activity_is_unset() {
        assert_eq!(
            parse_line("activity gaming").unwrap(),
            Some(Input::Activity(None))
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("-3").is_err());
        assert!(parse_line("1.5").is_err());
        assert!(parse_line("slouching").is_err());
        assert!(parse_line("close now").is_err());
        assert!(parse_line("activity work extra").is_err());

        let err = parse_line("bogus").unwrap_err();
        assert_eq!(err.to_string(), "unrecognized input line: \"bogus\"");
    }

    #[tokio::test]
    async fn reader_forwards_events_and_skips_garbage() {
        let input: &[u8] = b"activity work\nbaseline\n\nnope\n3\n0\nclose\n";
        let (tx, mut rx) = mpsc::channel(16);

        read_inputs(input, tx).await;

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                Input::Activity(Some(Activity::Work)),
                Input::Baseline,
                Input::Sample(3),
                Input::Sample(0),
                Input::Close,
            ]
        );
    }
}
