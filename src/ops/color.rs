//! Colour node-graph operations.
//!
//! All of these act on the node graph of the clip under the playhead, the
//! same clip the editor's colour page shows. Primary-correction reads and
//! writes go through the wheel/channel accessors one value at a time; a
//! write reports how many parameters were applied.

use std::path::Path;

use serde_json::{json, Value};

use crate::host::{Channel, Handle, NodeGraph, NodeKind, Rgba, Wheel};

use super::{require_str, require_u64, OpContext, OpError, OpResult};

/// LUT file extensions the editor accepts.
const LUT_EXTENSIONS: [&str; 4] = [".cube", ".3dl", ".mga", ".dat"];

fn wheel_json(graph: &Handle<dyn NodeGraph>, wheel: Wheel) -> OpResult<Value> {
    let mut out = serde_json::Map::new();
    for channel in Channel::ALL {
        out.insert(channel.as_str().to_string(), json!(graph.wheel(wheel, channel)?));
    }
    Ok(Value::Object(out))
}

fn apply_wheel(
    graph: &Handle<dyn NodeGraph>,
    wheel: Wheel,
    values: Option<&Value>,
    changes: &mut u32,
) -> OpResult<()> {
    let Some(values) = values.and_then(Value::as_object) else {
        return Ok(());
    };
    for (channel_name, value) in values {
        let Some(channel) = Channel::parse(channel_name) else {
            continue;
        };
        let Some(value) = value.as_f64() else {
            return Err(OpError::InvalidRequest(format!(
                "{}.{channel_name} must be a number",
                wheel.as_str()
            )));
        };
        if graph.set_wheel(wheel, channel, value)? {
            *changes += 1;
        }
    }
    Ok(())
}

fn validate_lut_path(path: &str) -> OpResult<&Path> {
    let lower = path.to_lowercase();
    if !LUT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(OpError::InvalidRequest(format!(
            "Invalid LUT file format. Supported formats: {}",
            LUT_EXTENSIONS.join(", ")
        )));
    }
    let path = Path::new(path);
    if !path.exists() {
        return Err(OpError::Failed(format!(
            "LUT file not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Index of the selected node.
pub fn get_current_node_index(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    Ok(json!({ "node_index": graph.current_node_index()? }))
}

/// Selects a node by index.
pub fn set_current_node_index(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let index = require_u64(data, "index")? as usize;
    let graph = cx.current_node_graph()?;
    let count = graph.node_count()?;
    if index < 1 || index > count {
        return Err(OpError::InvalidRequest(format!(
            "Invalid node index: {index}. Valid range is 1-{count}"
        )));
    }
    if graph.set_current_node_index(index)? {
        Ok(json!({ "message": format!("Current node set to index {index}") }))
    } else {
        Err(OpError::Failed(format!(
            "Failed to set current node to index {index}"
        )))
    }
}

/// Adds a serial node after the current one.
pub fn add_serial_node(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let node_index = graph.add_serial_node()?;
    Ok(json!({ "message": "Added new serial node", "node_index": node_index }))
}

/// Adds a parallel node alongside the current one.
pub fn add_parallel_node(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let node_index = graph.add_parallel_node()?;
    Ok(json!({ "message": "Added new parallel node", "node_index": node_index }))
}

/// Adds a layer node under the current one.
pub fn add_layer_node(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let node_index = graph.add_layer_node()?;
    Ok(json!({ "message": "Added new layer node", "node_index": node_index }))
}

/// Deletes the selected node. Node 1 is protected.
pub fn delete_current_node(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    if graph.current_node_index()? == 1 {
        return Err(OpError::Failed(
            "Cannot delete Node 1 (first node)".to_string(),
        ));
    }
    if graph.delete_current_node()? {
        Ok(json!({ "message": "Deleted current node" }))
    } else {
        Err(OpError::Failed("Failed to delete current node".to_string()))
    }
}

/// Clears all grades on the selected node.
pub fn reset_current_node(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let index = graph.current_node_index()?;
    if graph.reset_current_node()? {
        Ok(json!({ "message": format!("Reset node {index}") }))
    } else {
        Err(OpError::Failed("Failed to reset current node".to_string()))
    }
}

/// Lists the nodes in the graph with labels and kinds.
pub fn get_node_list(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let count = graph.node_count()?;
    if count == 0 {
        return Err(OpError::Failed("No nodes found in node graph".to_string()));
    }
    let current = graph.current_node_index()?;

    let mut nodes = Vec::with_capacity(count);
    for index in 1..=count {
        let label = graph.node_label(index).unwrap_or_default();
        // Older editor versions cannot report node kinds; default to serial.
        let kind = graph.node_kind(index).unwrap_or(NodeKind::Serial);
        nodes.push(json!({
            "index": index,
            "label": label,
            "is_current": index == current,
            "node_type": kind.as_str(),
        }));
    }

    Ok(json!({
        "node_count": count,
        "current_node_index": current,
        "nodes": nodes,
    }))
}

/// Reads lift/gamma/gain/contrast and saturation of the selected node.
pub fn get_primary_correction(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let node_index = graph.current_node_index()?;

    let mut result = json!({
        "node_index": node_index,
        "lift": wheel_json(&graph, Wheel::Lift)?,
        "gamma": wheel_json(&graph, Wheel::Gamma)?,
        "gain": wheel_json(&graph, Wheel::Gain)?,
    });

    // Contrast and saturation arrived in later API versions.
    if let Ok(contrast) = wheel_json(&graph, Wheel::Contrast) {
        result["contrast"] = contrast;
    }
    if let Ok(saturation) = graph.saturation() {
        result["saturation"] = json!(saturation);
    }

    Ok(result)
}

/// Writes primary-correction parameters, reporting how many were applied.
pub fn set_primary_correction(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let mut changes = 0u32;

    apply_wheel(&graph, Wheel::Lift, data.get("lift"), &mut changes)?;
    apply_wheel(&graph, Wheel::Gamma, data.get("gamma"), &mut changes)?;
    apply_wheel(&graph, Wheel::Gain, data.get("gain"), &mut changes)?;
    apply_wheel(&graph, Wheel::Contrast, data.get("contrast"), &mut changes)?;

    if let Some(saturation) = data.get("saturation") {
        let value = saturation.as_f64().ok_or_else(|| {
            OpError::InvalidRequest("saturation must be a number".to_string())
        })?;
        if graph.set_saturation(value)? {
            changes += 1;
        }
    }

    if changes == 0 {
        return Err(OpError::InvalidRequest(
            "No valid correction parameters provided".to_string(),
        ));
    }

    Ok(json!({
        "message": format!("Updated {changes} primary correction parameters"),
        "node_index": graph.current_node_index()?,
    }))
}

/// Label of the selected node.
pub fn get_node_label(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let index = graph.current_node_index()?;
    Ok(json!({
        "node_index": index,
        "label": graph.node_label(index)?,
    }))
}

/// Renames the selected node.
pub fn set_node_label(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let label = require_str(data, "label")?;
    let graph = cx.current_node_graph()?;
    let index = graph.current_node_index()?;
    if graph.set_node_label(index, label)? {
        Ok(json!({ "message": format!("Set label for node {index} to '{label}'") }))
    } else {
        Err(OpError::Failed("Failed to set node label".to_string()))
    }
}

/// Tile colour of the selected node.
pub fn get_node_color(cx: &OpContext<'_>) -> OpResult<Value> {
    let graph = cx.current_node_graph()?;
    let color = graph.tile_color()?;
    Ok(json!({
        "node_index": graph.current_node_index()?,
        "color": color,
    }))
}

/// Sets the tile colour of the selected node, clamping to `0.0..=1.0`.
pub fn set_node_color(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let component = |key: &str| -> OpResult<f64> {
        data.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| OpError::missing(key))
    };
    let color = Rgba {
        red: component("red")?,
        green: component("green")?,
        blue: component("blue")?,
        alpha: data.get("alpha").and_then(Value::as_f64).unwrap_or(1.0),
    }
    .clamped();

    let graph = cx.current_node_graph()?;
    if graph.set_tile_color(color)? {
        Ok(json!({
            "message": format!("Set color for node {}", graph.current_node_index()?),
        }))
    } else {
        Err(OpError::Failed("Failed to set node color".to_string()))
    }
}

/// Registers a LUT file with the graph.
pub fn import_lut(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let lut_path = require_str(data, "lut_path")?;
    let path = validate_lut_path(lut_path)?;
    let graph = cx.current_node_graph()?;
    if graph.import_lut(path)? {
        let basename = path
            .file_name()
            .map_or_else(|| lut_path.to_string(), |n| n.to_string_lossy().into_owned());
        Ok(json!({ "message": format!("Imported LUT: {basename}") }))
    } else {
        Err(OpError::Failed(format!("Failed to import LUT: {lut_path}")))
    }
}

/// Applies a LUT file to the selected node.
pub fn apply_lut_to_current_node(cx: &OpContext<'_>, data: &Value) -> OpResult<Value> {
    let lut_path = require_str(data, "lut_path")?;
    let path = validate_lut_path(lut_path)?;
    let graph = cx.current_node_graph()?;
    if graph.apply_lut(path)? {
        Ok(json!({
            "message": format!("Applied LUT to node {}", graph.current_node_index()?),
        }))
    } else {
        Err(OpError::Failed(format!("Failed to apply LUT: {lut_path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimulatedEditor;
    use crate::ops::Session;
    use serde_json::json;

    fn demo_session() -> Session {
        Session::new(Some(SimulatedEditor::with_demo_project()), false)
    }

    #[test]
    fn node_graph_starts_with_one_serial_node() {
        let mut session = demo_session();
        let result = session.dispatch_named("get_node_list", &json!({})).unwrap();
        assert_eq!(result["node_count"], 1);
        assert_eq!(result["current_node_index"], 1);
        assert_eq!(result["nodes"][0]["node_type"], "Serial");
    }

    #[test]
    fn add_and_delete_nodes() {
        let mut session = demo_session();
        let added = session.dispatch_named("add_serial_node", &json!({})).unwrap();
        assert_eq!(added["node_index"], 2);

        session.dispatch_named("add_parallel_node", &json!({})).unwrap();
        let list = session.dispatch_named("get_node_list", &json!({})).unwrap();
        assert_eq!(list["node_count"], 3);

        session.dispatch_named("delete_current_node", &json!({})).unwrap();
        let list = session.dispatch_named("get_node_list", &json!({})).unwrap();
        assert_eq!(list["node_count"], 2);
    }

    #[test]
    fn node_one_cannot_be_deleted() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("delete_current_node", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("Node 1"));
    }

    #[test]
    fn set_current_node_index_validates_range() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("set_current_node_index", &json!({"index": 7}))
            .unwrap_err();
        assert!(err.to_string().contains("Valid range is 1-1"));
    }

    #[test]
    fn primary_correction_round_trip() {
        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "set_primary_correction",
                &json!({
                    "lift": {"red": 0.05, "master": -0.02},
                    "gain": {"blue": 1.1},
                    "saturation": 0.8,
                }),
            )
            .unwrap();
        assert_eq!(
            result["message"],
            "Updated 4 primary correction parameters"
        );

        let read = session
            .dispatch_named("get_primary_correction", &json!({}))
            .unwrap();
        assert!((read["lift"]["red"].as_f64().unwrap() - 0.05).abs() < 1e-9);
        assert!((read["gain"]["blue"].as_f64().unwrap() - 1.1).abs() < 1e-9);
        assert!((read["saturation"].as_f64().unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn set_primary_correction_with_no_fields_fails() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("set_primary_correction", &json!({}))
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidRequest(_)));
    }

    #[test]
    fn node_label_round_trip() {
        let mut session = demo_session();
        session
            .dispatch_named("set_node_label", &json!({"label": "Base Grade"}))
            .unwrap();
        let result = session.dispatch_named("get_node_label", &json!({})).unwrap();
        assert_eq!(result["label"], "Base Grade");
    }

    #[test]
    fn node_color_is_clamped() {
        let mut session = demo_session();
        session
            .dispatch_named(
                "set_node_color",
                &json!({"red": 1.8, "green": 0.2, "blue": 0.3}),
            )
            .unwrap();
        let result = session.dispatch_named("get_node_color", &json!({})).unwrap();
        assert!((result["color"]["red"].as_f64().unwrap() - 1.0).abs() < 1e-9);
        assert!((result["color"]["alpha"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn lut_extension_is_validated() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("apply_lut_to_current_node", &json!({"lut_path": "/tmp/look.txt"}))
            .unwrap_err();
        assert!(matches!(err, OpError::InvalidRequest(_)));
    }

    #[test]
    fn lut_file_must_exist() {
        let mut session = demo_session();
        let err = session
            .dispatch_named("apply_lut_to_current_node", &json!({"lut_path": "/no/such.cube"}))
            .unwrap_err();
        assert!(err.to_string().contains("LUT file not found"));
    }

    #[test]
    fn lut_applies_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let lut = dir.path().join("teal_orange.cube");
        std::fs::write(&lut, "LUT_3D_SIZE 2\n").unwrap();

        let mut session = demo_session();
        let result = session
            .dispatch_named(
                "apply_lut_to_current_node",
                &json!({"lut_path": lut.to_str().unwrap()}),
            )
            .unwrap();
        assert!(result["message"].as_str().unwrap().contains("Applied LUT"));
    }
}
