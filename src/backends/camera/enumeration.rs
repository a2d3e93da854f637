// SPDX-License-Identifier: MPL-2.0

//! Camera discovery
//!
//! PipeWire sources are listed with `pw-cli ls Node`; raw V4L2 capture nodes
//! are queried under `/dev` when PipeWire has nothing to offer.

use super::types::{CameraBackendType, CameraDevice, CameraSource};
use std::process::Command;
use tracing::{debug, info};

/// List cameras for the preferred backend
pub fn enumerate_cameras(backend: CameraBackendType) -> Vec<CameraDevice> {
    let cameras = match backend {
        CameraBackendType::PipeWire => enumerate_pipewire_cameras(),
        CameraBackendType::V4l2 => enumerate_v4l2_cameras(),
        CameraBackendType::Auto => {
            let cameras = enumerate_pipewire_cameras();
            if cameras.is_empty() {
                debug!("No PipeWire cameras, falling back to V4L2");
                enumerate_v4l2_cameras()
            } else {
                cameras
            }
        }
    };
    info!(count = cameras.len(), %backend, "Enumerated cameras");
    cameras
}

/// Video sources known to the PipeWire daemon
pub fn enumerate_pipewire_cameras() -> Vec<CameraDevice> {
    let output = match Command::new("pw-cli").args(["ls", "Node"]).output() {
        Ok(output) if output.status.success() => output,
        Ok(_) => {
            debug!("pw-cli command failed");
            return Vec::new();
        }
        Err(e) => {
            debug!(error = %e, "pw-cli unavailable");
            return Vec::new();
        }
    };

    parse_pw_cli_nodes(&String::from_utf8_lossy(&output.stdout))
}

/// Node currently being read from `pw-cli` output
#[derive(Default)]
struct PendingNode {
    id: Option<String>,
    serial: Option<String>,
    name: Option<String>,
    is_video_source: bool,
}

impl PendingNode {
    fn into_camera(self) -> Option<CameraDevice> {
        if !self.is_video_source {
            return None;
        }
        let id = self.id?;
        let name = self.name?;
        // object.serial is what target-object expects; older daemons only
        // have the node id
        let target = self.serial.unwrap_or(id);
        debug!(name = %name, target = %target, "Found video camera");
        Some(CameraDevice {
            name,
            path: format!("pipewire-{}", target),
            source: CameraSource::PipeWire {
                target: Some(target),
            },
        })
    }
}

/// Parse the output of `pw-cli ls Node`
pub fn parse_pw_cli_nodes(output: &str) -> Vec<CameraDevice> {
    let mut cameras = Vec::new();
    let mut node = PendingNode::default();

    for line in output.lines() {
        let trimmed = line.trim();

        // "id 76, type PipeWire:Interface:Node/3"
        if let Some(rest) = trimmed.strip_prefix("id ")
            && trimmed.contains("type PipeWire:Interface:Node")
        {
            cameras.extend(std::mem::take(&mut node).into_camera());
            node.id = rest.split(',').next().map(|id| id.trim().to_string());
            continue;
        }

        if trimmed.contains("media.class") && trimmed.contains("\"Video/Source\"") {
            node.is_video_source = true;
        } else if trimmed.contains("object.serial") {
            node.serial = extract_quoted_value(trimmed);
        } else if trimmed.contains("node.description") {
            node.name = extract_quoted_value(trimmed);
        }
    }
    cameras.extend(node.into_camera());

    cameras
}

/// `property = "value"` -> `value`
fn extract_quoted_value(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let end = line[start + 1..].find('"')?;
    Some(line[start + 1..start + 1 + end].to_string())
}

/// V4L2 nodes that support video capture
pub fn enumerate_v4l2_cameras() -> Vec<CameraDevice> {
    let entries = match std::fs::read_dir("/dev") {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, "Cannot read /dev");
            return Vec::new();
        }
    };

    let mut paths: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("video"))
        .map(|name| format!("/dev/{}", name))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| query_v4l2_device(&path))
        .collect()
}

fn query_v4l2_device(path: &str) -> Option<CameraDevice> {
    let device = v4l::Device::with_path(path).ok()?;
    let caps = device.query_caps().ok()?;

    // Metadata nodes share the video prefix but cannot stream frames
    if !caps
        .capabilities
        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
    {
        debug!(path, "Skipping non-capture V4L2 node");
        return None;
    }

    debug!(path, card = %caps.card, driver = %caps.driver, "Found V4L2 camera");
    Some(CameraDevice {
        name: caps.card,
        path: path.to_string(),
        source: CameraSource::V4l2 {
            device: path.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PW_CLI_OUTPUT: &str = r#"
	id 31, type PipeWire:Interface:Node/3
 		object.serial = "31"
 		factory.id = "10"
 		node.description = "Dummy-Driver"
 		node.name = "Dummy-Driver"
	id 62, type PipeWire:Interface:Node/3
 		object.serial = "2146"
 		object.path = "v4l2:/dev/video0"
 		node.description = "Integrated Camera (V4L2)"
 		node.name = "v4l2_input.pci-0000_00_14.0-usb-0_8_1.0"
 		media.class = "Video/Source"
	id 70, type PipeWire:Interface:Node/3
 		node.description = "Built-in Audio"
 		media.class = "Audio/Source"
	id 88, type PipeWire:Interface:Node/3
 		node.description = "USB Webcam"
 		media.class = "Video/Source"
"#;

    #[test]
    fn test_parse_pw_cli_nodes() {
        let cameras = parse_pw_cli_nodes(PW_CLI_OUTPUT);
        assert_eq!(cameras.len(), 2);

        assert_eq!(cameras[0].name, "Integrated Camera (V4L2)");
        assert_eq!(cameras[0].path, "pipewire-2146");
        assert_eq!(
            cameras[0].source,
            CameraSource::PipeWire {
                target: Some("2146".to_string())
            }
        );

        // No serial, falls back to the node id
        assert_eq!(cameras[1].name, "USB Webcam");
        assert_eq!(cameras[1].path, "pipewire-88");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_pw_cli_nodes("").is_empty());
    }

    #[test]
    fn test_extract_quoted_value() {
        assert_eq!(
            extract_quoted_value(r#"node.description = "Webcam""#),
            Some("Webcam".to_string())
        );
        assert_eq!(extract_quoted_value("node.description = Webcam"), None);
    }
}
