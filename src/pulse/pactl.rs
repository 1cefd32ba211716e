//! PulseAudio / PipeWire backend driving the `pactl` command-line tool
//!
//! Works against both pulseaudio and pipewire-pulse. Listings use
//! `pactl -f json`, so pactl 16 or newer is required.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    AudioBackend, BackendError, BackendEvent, ObjectChange, ObjectHandle, PropertyMap, TargetKind,
};

/// Capacity of the notification queue handed out by `subscribe`
const EVENT_QUEUE_CAPACITY: usize = 256;

/// One entry of a `pactl -f json list ...` array
#[derive(Debug, Deserialize)]
struct PactlObject {
    index: u32,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

/// Backend that shells out to `pactl`
pub struct PactlBackend {
    program: String,
    /// Property lists from the most recent listing of each kind
    properties: Mutex<HashMap<ObjectHandle, PropertyMap>>,
}

impl PactlBackend {
    /// Create a backend using the given `pactl` executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            properties: Mutex::new(HashMap::new()),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, BackendError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| BackendError::Spawn {
                command: self.describe(args),
                source,
            })?;

        if !output.status.success() {
            return Err(BackendError::CommandFailed {
                command: self.describe(args),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl Default for PactlBackend {
    fn default() -> Self {
        Self::new("pactl")
    }
}

/// `pactl list` object type for a target kind
fn list_noun(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Sink => "sinks",
        TargetKind::Source => "sources",
        TargetKind::PlaybackStream => "sink-inputs",
        TargetKind::RecordStream => "source-outputs",
    }
}

/// `pactl set-*-volume` subcommand for a target kind
fn volume_command(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Sink => "set-sink-volume",
        TargetKind::Source => "set-source-volume",
        TargetKind::PlaybackStream => "set-sink-input-volume",
        TargetKind::RecordStream => "set-source-output-volume",
    }
}

/// Facility name used by `pactl subscribe` for a target kind
fn kind_from_facility(facility: &str) -> Option<TargetKind> {
    match facility {
        "sink" => Some(TargetKind::Sink),
        "source" => Some(TargetKind::Source),
        "sink-input" => Some(TargetKind::PlaybackStream),
        "source-output" => Some(TargetKind::RecordStream),
        _ => None,
    }
}

/// Parse a `pactl -f json list` array into handles with their properties
fn parse_listing(
    kind: TargetKind,
    json: &[u8],
) -> Result<Vec<(ObjectHandle, PropertyMap)>, serde_json::Error> {
    let objects: Vec<PactlObject> = serde_json::from_slice(json)?;

    Ok(objects
        .into_iter()
        .map(|obj| {
            let props = obj
                .properties
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect();
            (ObjectHandle::new(kind, obj.index), props)
        })
        .collect())
}

/// Parse one line of `pactl subscribe` output.
///
/// Lines look like `Event 'new' on sink-input #42`. Only `new` and `remove`
/// on the four object facilities produce an event.
pub fn parse_subscribe_line(line: &str) -> Option<BackendEvent> {
    let rest = line.trim().strip_prefix("Event '")?;
    let (verb, rest) = rest.split_once('\'')?;
    let rest = rest.trim_start().strip_prefix("on ")?;
    let (facility, index) = rest.trim().split_once(" #")?;

    let change = match verb {
        "new" => ObjectChange::Added,
        "remove" => ObjectChange::Removed,
        _ => return None,
    };

    Some(BackendEvent {
        kind: kind_from_facility(facility)?,
        change,
        index: index.trim().parse().ok()?,
    })
}

#[async_trait]
impl AudioBackend for PactlBackend {
    fn name(&self) -> &str {
        "pactl"
    }

    async fn list(&self, kind: TargetKind) -> Result<Vec<ObjectHandle>, BackendError> {
        let args = ["-f", "json", "list", list_noun(kind)];
        let stdout = self.run(&args).await?;

        let objects = parse_listing(kind, &stdout).map_err(|source| BackendError::Parse {
            command: self.describe(&args),
            source,
        })?;

        let handles: Vec<ObjectHandle> = objects.iter().map(|(handle, _)| *handle).collect();

        let mut cache = self.properties.lock();
        cache.retain(|handle, _| handle.kind != kind);
        cache.extend(objects);
        drop(cache);

        debug!("pactl listed {} {} object(s)", handles.len(), kind);
        Ok(handles)
    }

    async fn properties(&self, handle: ObjectHandle) -> Result<PropertyMap, BackendError> {
        self.properties
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(BackendError::UnknownObject(handle))
    }

    async fn set_volume(
        &self,
        handle: ObjectHandle,
        left: u32,
        right: u32,
    ) -> Result<(), BackendError> {
        let index = handle.index.to_string();
        let left = left.to_string();
        let right = right.to_string();
        let args = [
            volume_command(handle.kind),
            index.as_str(),
            left.as_str(),
            right.as_str(),
        ];

        self.run(&args).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<BackendEvent>, BackendError> {
        let mut child = Command::new(&self.program)
            .arg("subscribe")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                command: self.describe(&["subscribe"]),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Other("pactl subscribe has no stdout".to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        tokio::spawn(async move {
            // Owning the child here ties its lifetime to the reader task
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_subscribe_line(&line) {
                            debug!("pactl event: {:?}", event);
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        warn!("pactl subscribe ended");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read pactl subscribe output: {}", e);
                        break;
                    }
                }
            }
        });

        info!("Subscribed to audio server notifications via pactl");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe_new_sink_input() {
        let event = parse_subscribe_line("Event 'new' on sink-input #42").unwrap();
        assert_eq!(event.kind, TargetKind::PlaybackStream);
        assert_eq!(event.change, ObjectChange::Added);
        assert_eq!(event.index, 42);
    }

    #[test]
    fn test_parse_subscribe_remove_source_output() {
        let event = parse_subscribe_line("Event 'remove' on source-output #7\n").unwrap();
        assert_eq!(event.kind, TargetKind::RecordStream);
        assert_eq!(event.change, ObjectChange::Removed);
        assert_eq!(event.index, 7);
    }

    #[test]
    fn test_parse_subscribe_ignores_change_and_other_facilities() {
        assert!(parse_subscribe_line("Event 'change' on sink #0").is_none());
        assert!(parse_subscribe_line("Event 'new' on client #12").is_none());
        assert!(parse_subscribe_line("Event 'new' on module #3").is_none());
        assert!(parse_subscribe_line("garbage").is_none());
        assert!(parse_subscribe_line("Event 'new' on sink #abc").is_none());
    }

    #[test]
    fn test_parse_listing_extracts_properties() {
        let json = br#"[
            {"index": 3, "name": "alsa_output.pci", "properties": {
                "device.description": "Speakers",
                "alsa.card": 0
            }},
            {"index": 5, "name": "bluez_output"}
        ]"#;

        let objects = parse_listing(TargetKind::Sink, json).unwrap();
        assert_eq!(objects.len(), 2);

        let (handle, props) = &objects[0];
        assert_eq!(*handle, ObjectHandle::new(TargetKind::Sink, 3));
        assert_eq!(props.get("device.description").map(String::as_str), Some("Speakers"));
        assert_eq!(props.get("alsa.card").map(String::as_str), Some("0"));

        assert!(objects[1].1.is_empty());
    }

    #[test]
    fn test_parse_listing_rejects_non_array() {
        assert!(parse_listing(TargetKind::Source, b"{\"index\": 1}").is_err());
    }

    #[tokio::test]
    async fn test_properties_unknown_handle() {
        let backend = PactlBackend::default();
        let handle = ObjectHandle::new(TargetKind::Sink, 99);
        let err = backend.properties(handle).await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownObject(h) if h == handle));
    }

    #[test]
    fn test_list_noun_per_kind() {
        assert_eq!(list_noun(TargetKind::Sink), "sinks");
        assert_eq!(list_noun(TargetKind::Source), "sources");
        assert_eq!(list_noun(TargetKind::PlaybackStream), "sink-inputs");
        assert_eq!(list_noun(TargetKind::RecordStream), "source-outputs");
    }

    #[test]
    fn test_volume_command_per_kind() {
        assert_eq!(volume_command(TargetKind::Sink), "set-sink-volume");
        assert_eq!(volume_command(TargetKind::Source), "set-source-volume");
        assert_eq!(volume_command(TargetKind::PlaybackStream), "set-sink-input-volume");
        assert_eq!(volume_command(TargetKind::RecordStream), "set-source-output-volume");
    }

    /// Write a stand-in `pactl` that logs its argv and serves canned listings
    #[cfg(unix)]
    fn fake_pactl(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("argv.log");
        let script = dir.join("pactl");
        let body = format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
case "$*" in
  "-f json list sinks")
    echo '[{{"index": 3, "properties": {{"device.description": "Speakers"}}}}]' ;;
  "-f json list sink-inputs")
    echo '[{{"index": 7, "properties": {{"application.name": "Browser"}}}}]' ;;
  "-f json list "*)
    echo '[]' ;;
  set-source-volume*)
    echo "No such entity" >&2
    exit 1 ;;
esac
"#,
            log = log.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commands_sent_to_pactl() {
        let dir = tempfile::tempdir().unwrap();
        let (script, log) = fake_pactl(dir.path());
        let backend = PactlBackend::new(script.to_string_lossy());

        let sinks = backend.list(TargetKind::Sink).await.unwrap();
        assert_eq!(sinks, vec![ObjectHandle::new(TargetKind::Sink, 3)]);
        let streams = backend.list(TargetKind::PlaybackStream).await.unwrap();
        assert_eq!(streams, vec![ObjectHandle::new(TargetKind::PlaybackStream, 7)]);
        assert!(backend.list(TargetKind::Source).await.unwrap().is_empty());

        let props = backend.properties(streams[0]).await.unwrap();
        assert_eq!(props.get("application.name").map(String::as_str), Some("Browser"));

        backend.set_volume(streams[0], 100, 200).await.unwrap();
        backend.set_volume(sinks[0], 65535, 65535).await.unwrap();

        let err = backend
            .set_volume(ObjectHandle::new(TargetKind::Source, 1), 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::CommandFailed { ref stderr, .. } if stderr == "No such entity"
        ));

        let logged = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = logged.lines().collect();
        assert_eq!(
            lines,
            vec![
                "-f json list sinks",
                "-f json list sink-inputs",
                "-f json list sources",
                "set-sink-input-volume 7 100 200",
                "set-sink-volume 3 65535 65535",
                "set-source-volume 1 0 0",
            ]
        );
    }
}
