//! Tracing subscriber setup: env filter plus a text or JSON formatter.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "traffic_light=info";

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the default `traffic_light=info`. With `json` set,
/// every event is a single JSON object per line.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVE.into());
    build_subscriber(json, filter, std::io::stderr).init();
}

fn build_subscriber<W>(
    json: bool,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        Box::new(
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(false)
                        .with_span_list(false),
                )
                .with(filter),
        )
    } else {
        Box::new(
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_target(false)
                        .with_ansi(false),
                )
                .with(filter),
        )
    }
}

/// In-memory log sink for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CaptureWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl CaptureWriter {
    pub(crate) fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).lines().map(str::to_string).collect()
    }
}

#[cfg(test)]
impl std::io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_json_logs_one_object_per_event() {
        let capture = CaptureWriter::default();
        let subscriber = build_subscriber(true, EnvFilter::new("info"), capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(payload = %r#"{"status":"green"}"#, "Status received");
            debug!("filtered out");
        });

        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        let event: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(event["level"], "INFO");
        assert_eq!(event["fields"]["message"], "Status received");
        assert_eq!(event["fields"]["payload"], r#"{"status":"green"}"#);
    }

    #[test]
    fn test_text_logs_respect_filter() {
        let capture = CaptureWriter::default();
        let subscriber = build_subscriber(false, EnvFilter::new("warn"), capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!("hidden");
            tracing::warn!("shown");
        });

        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("shown"));
        assert!(!lines[0].starts_with('{'));
    }
}
