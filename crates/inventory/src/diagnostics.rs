//! Per-line rejections and the sink they are reported to.
//!
//! Batch operations never fail because of a single bad line. Each skipped line
//! produces one [`LineRejection`], handed to the caller-supplied
//! [`DiagnosticSink`], and processing moves on to the next line.

use thiserror::Error;

/// Why a shipment or sale line was skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineRejection {
    /// Shipment line for a title unknown to the catalog, without a publisher.
    #[error("Publisher is missing for the book {title}")]
    MissingPublisher { title: String },

    /// Sale line asking for more copies than the store holds.
    #[error("Attempt to sell too many items of {title}. Ignored.")]
    Oversell {
        title: String,
        requested: u32,
        in_stock: u32,
    },

    /// Sale line for a title the store has never held.
    #[error("{title} is not in stock. Ignored.")]
    UnknownTitle { title: String },

    /// Shipment line whose new book or publisher record would be invalid.
    #[error("Invalid line for {title}: {reason}. Ignored.")]
    InvalidLine { title: String, reason: String },
}

impl LineRejection {
    pub fn title(&self) -> &str {
        match self {
            LineRejection::MissingPublisher { title }
            | LineRejection::Oversell { title, .. }
            | LineRejection::UnknownTitle { title }
            | LineRejection::InvalidLine { title, .. } => title,
        }
    }

    /// Stable machine-readable reason, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            LineRejection::MissingPublisher { .. } => "missing_publisher",
            LineRejection::Oversell { .. } => "oversell",
            LineRejection::UnknownTitle { .. } => "unknown_title",
            LineRejection::InvalidLine { .. } => "invalid_line",
        }
    }
}

/// Receiver of per-line rejections.
pub trait DiagnosticSink {
    fn report(&mut self, rejection: LineRejection);
}

/// Collects rejections in order (tests, callers that want to inspect them).
impl DiagnosticSink for Vec<LineRejection> {
    fn report(&mut self, rejection: LineRejection) {
        self.push(rejection);
    }
}

impl<S> DiagnosticSink for &mut S
where
    S: DiagnosticSink + ?Sized,
{
    fn report(&mut self, rejection: LineRejection) {
        (**self).report(rejection)
    }
}

/// Logs every rejection at error level through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink {
    reported: usize,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rejections logged so far.
    pub fn reported(&self) -> usize {
        self.reported
    }
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, rejection: LineRejection) {
        self.reported += 1;
        tracing::error!(
            title = rejection.title(),
            reason = rejection.kind(),
            "{rejection}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn messages_name_the_title() {
        let missing = LineRejection::MissingPublisher {
            title: "Speak memory".to_string(),
        };
        assert_eq!(missing.to_string(), "Publisher is missing for the book Speak memory");

        let oversell = LineRejection::Oversell {
            title: "Lolita".to_string(),
            requested: 500,
            in_stock: 10,
        };
        assert_eq!(oversell.to_string(), "Attempt to sell too many items of Lolita. Ignored.");

        let unknown = LineRejection::UnknownTitle {
            title: "The Gift".to_string(),
        };
        assert_eq!(unknown.to_string(), "The Gift is not in stock. Ignored.");
    }

    #[test]
    fn title_and_kind_are_exposed_for_every_variant() {
        let invalid = LineRejection::InvalidLine {
            title: "Ada".to_string(),
            reason: "validation failed: publisher name cannot be empty".to_string(),
        };
        assert_eq!(invalid.title(), "Ada");
        assert_eq!(invalid.kind(), "invalid_line");
    }

    #[test]
    fn vec_sink_collects_in_order_through_a_reference() {
        fn report_two(mut sink: impl DiagnosticSink) {
            sink.report(LineRejection::UnknownTitle { title: "A".to_string() });
            sink.report(LineRejection::UnknownTitle { title: "B".to_string() });
        }

        let mut collected: Vec<LineRejection> = Vec::new();
        report_two(&mut collected);
        let titles: Vec<_> = collected.iter().map(LineRejection::title).collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[test]
    fn tracing_sink_logs_each_rejection_at_error_level() {
        let captured = Arc::new(Mutex::new(Vec::<u8>::new()));
        let writer = Arc::clone(&captured);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || CapturedWriter(Arc::clone(&writer)))
            .with_ansi(false)
            .without_time()
            .finish();

        let mut sink = TracingSink::new();
        tracing::subscriber::with_default(subscriber, || {
            sink.report(LineRejection::MissingPublisher { title: "Pnin".to_string() });
        });
        assert_eq!(sink.reported(), 1);

        let output = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("ERROR"));
        assert!(lines[0].contains("Publisher is missing for the book Pnin"));
        assert!(lines[0].contains("missing_publisher"));
    }

    struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
