use std::sync::Arc;

use glam::Vec4;
use glint::{
    types::{
        AttributeArray, AttributeValue, BufferObject, BufferObjectElement, BufferTarget, BufferUsage, ComponentType,
        DataContainer, Holder, Node, PrimitiveType, ShaderInputRegistry, ShaderProgram, Shape,
    },
    Feature,
};
use glint_test::{position_array, triangle_buffer, triangle_node, TestRunner, FRAGMENT_SOURCE};

/// Replaces the vertex inputs of the single shape of `node`.
fn with_array(mut node: Node, array: Arc<AttributeArray>) -> Node {
    node.shapes_mut()[0] = Shape::new(PrimitiveType::Triangles, array);
    node
}

fn offset_buffer(instances: usize) -> Arc<BufferObject> {
    let buffer = BufferObject::new(BufferTarget::Array);
    buffer.add_spec(ComponentType::Float, 2, 0);
    buffer.set_data(
        DataContainer::from_slice(&vec![[0.5f32; 2]; instances], false),
        8,
        instances,
        BufferUsage::Static,
    );
    buffer
}

fn instanced_array(registry: &Arc<ShaderInputRegistry>) -> Arc<AttributeArray> {
    let array = position_array(registry, &triangle_buffer());
    let offset = registry
        .create_attribute(
            "aOffset",
            AttributeValue::Buffer(BufferObjectElement {
                buffer: offset_buffer(2),
                spec_index: 0,
            }),
        )
        .expect("aOffset is registered")
        .with_divisor(1);
    array.add_attribute(offset).expect("array has room");
    array
}

#[test]
pub fn vertex_array_objects_are_pointed_once() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("gen_vertex_array"), 1);
    assert_eq!(runner.gm.count("bind_vertex_array"), 1);
    assert_eq!(runner.gm.args_of("vertex_attrib_pointer"), vec!["(0, 3, Float, false, 12, 0)"]);
    assert_eq!(runner.gm.args_of("enable_vertex_attrib_array"), vec!["0"]);

    Ok(())
}

#[test]
pub fn emulated_arrays_are_pointed_again_when_switching() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::VertexArrays).build();
    let single = triangle_node(&runner.inputs);
    runner.draw_scene(&single);
    runner.draw_scene(&single);

    assert_eq!(runner.gm.count("gen_vertex_array"), 0);
    assert_eq!(runner.gm.count("vertex_attrib_pointer"), 1);

    let mut root = Node::new();
    root.add_child(triangle_node(&runner.inputs));
    root.add_child(triangle_node(&runner.inputs));
    runner.gm.clear_calls();
    runner.draw_scene(&root);
    runner.draw_scene(&root);

    assert_eq!(runner.gm.count("vertex_attrib_pointer"), 4);
    assert_eq!(runner.gm.count("draw_arrays"), 4);
    assert_eq!(runner.gm.count("bind_vertex_array"), 0);

    Ok(())
}

#[test]
pub fn constant_attributes_are_sent_once() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let array = position_array(&runner.inputs, &triangle_buffer());
    let color = runner
        .inputs
        .create_attribute("aColor", AttributeValue::FloatVector4(Vec4::new(1.0, 0.0, 0.0, 1.0)))?;
    array.add_attribute(color)?;
    let node = with_array(triangle_node(&runner.inputs), array);

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    let sent = runner.gm.args_of("vertex_attrib_4fv");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("(1, "), "{:?}", sent);
    assert_eq!(runner.gm.count("vertex_attrib_pointer"), 1);
    assert_eq!(runner.gm.count("draw_arrays"), 2);

    Ok(())
}

#[test]
pub fn disabled_attributes_are_turned_off() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    let array = node.shapes()[0].attribute_array.clone().expect("shape has an array");
    array.enable_attribute(0, false);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.args_of("disable_vertex_attrib_array"), vec!["0"]);
    // Nothing left to source vertices from.
    assert_eq!(runner.gm.count("draw_arrays"), 1);

    Ok(())
}

#[test]
pub fn attributes_missing_from_the_array_warn() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let program = ShaderProgram::from_sources(
        runner.inputs.clone(),
        "attribute vec3 aPosition;\nattribute vec4 aColor;\nuniform mat4 uModel;\nvoid main() {}\n",
        FRAGMENT_SOURCE,
    );
    program.set_label("two inputs");
    let mut node = triangle_node(&runner.inputs);
    node.set_shader_program(Some(program));

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(
        runner
            .log
            .count_warnings("Shader program 'two inputs' uses attribute 'aColor' but the attribute array does not provide it"),
        1
    );
    assert_eq!(runner.gm.count("draw_arrays"), 2);

    Ok(())
}

#[test]
pub fn instanced_attributes_get_a_divisor() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = with_array(triangle_node(&runner.inputs), instanced_array(&runner.inputs));

    runner.draw_scene(&node);

    assert_eq!(runner.gm.args_of("vertex_attrib_divisor"), vec!["(2, 1)"]);
    assert_eq!(runner.gm.count("vertex_attrib_pointer"), 2);

    Ok(())
}

#[test]
pub fn divisors_are_dropped_without_instancing() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::InstancedDrawing).build();
    let node = with_array(triangle_node(&runner.inputs), instanced_array(&runner.inputs));

    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("vertex_attrib_divisor"), 0);
    // Both buffers now advance per vertex, so the shorter one limits the draw.
    assert_eq!(runner.gm.args_of("draw_arrays"), vec!["(Triangles, 0, 2)"]);

    Ok(())
}

#[test]
pub fn labels_reach_the_driver() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let array = node.shapes()[0].attribute_array.clone().expect("shape has an array");
    array.set_label("positions");

    runner.draw_scene(&node);

    let labels = runner.gm.args_of("object_label");
    assert!(labels.iter().any(|args| args.contains("VertexArray") && args.contains("\"positions\"")), "{:?}", labels);

    Ok(())
}
