use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use glint::types::{
    AttributeSpec, AttributeType, Node, PrimitiveType, ShaderInputRegistry, ShaderProgram, Shape, Uniform, UniformSpec,
    UniformType, UniformValue,
};
use glint_test::{color_uniform, model_uniform, position_array, program, triangle_buffer, triangle_node, TestRunner};

#[test]
pub fn unchanged_uniforms_are_sent_once() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);

    runner.draw_scene(&node);
    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("uniform_4fv"), 1);
    assert_eq!(runner.gm.count("uniform_matrix_4fv"), 1);

    Ok(())
}

#[test]
pub fn changed_uniform_is_resent() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let mut node = triangle_node(&runner.inputs);

    runner.draw_scene(&node);
    node.set_uniform_by_name("uColor", UniformValue::FloatVector4(Vec4::new(1.0, 0.0, 0.0, 1.0)))?;
    runner.draw_scene(&node);

    let sent = runner.gm.args_of("uniform_4fv");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], format!("{:?}", (1, &[1.0f32, 0.0, 0.0, 1.0][..])));
    assert_eq!(runner.gm.count("uniform_matrix_4fv"), 1);

    Ok(())
}

#[test]
pub fn rewriting_the_same_value_sends_nothing() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let mut node = triangle_node(&runner.inputs);

    runner.draw_scene(&node);
    node.set_uniform_by_name("uColor", UniformValue::FloatVector4(Vec4::ONE))?;
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("uniform_4fv"), 1);

    Ok(())
}

#[test]
pub fn siblings_with_different_values_alternate() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let shared = program(&runner.inputs);
    let mut root = Node::new();
    for color in [Vec4::X, Vec4::Y] {
        let mut child = Node::new();
        child.set_shader_program(Some(shared.clone()));
        child.add_uniform(model_uniform(&runner.inputs, Mat4::IDENTITY));
        child.add_uniform(color_uniform(&runner.inputs, color));
        child.add_shape(Shape::new(
            PrimitiveType::Triangles,
            position_array(&runner.inputs, &triangle_buffer()),
        ));
        root.add_child(child);
    }

    runner.draw_scene(&root);
    runner.draw_scene(&root);

    assert_eq!(runner.gm.count("uniform_4fv"), 4);
    assert_eq!(runner.gm.count("uniform_matrix_4fv"), 1);

    Ok(())
}

#[test]
pub fn children_see_the_nearest_value() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let mut parent = triangle_node(&runner.inputs);
    let mut child = Node::new();
    child.add_uniform(color_uniform(&runner.inputs, Vec4::ZERO));
    child.add_shape(Shape::new(
        PrimitiveType::Points,
        position_array(&runner.inputs, &triangle_buffer()),
    ));
    parent.add_child(child);

    runner.draw_scene(&parent);

    let sent = runner.gm.args_of("uniform_4fv");
    assert_eq!(sent, vec![
        format!("{:?}", (1, &[1.0f32; 4][..])),
        format!("{:?}", (1, &[0.0f32; 4][..])),
    ]);

    Ok(())
}

#[test]
pub fn missing_uniform_warns_once() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let mut node = Node::new();
    node.set_shader_program(Some(program(&runner.inputs)));
    node.add_uniform(model_uniform(&runner.inputs, Mat4::IDENTITY));
    node.add_shape(Shape::new(
        PrimitiveType::Triangles,
        position_array(&runner.inputs, &triangle_buffer()),
    ));

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(runner.log.count_warnings("No value set for uniform 'uColor'"), 1);
    assert_eq!(runner.gm.count("draw_arrays"), 2);

    Ok(())
}

#[test]
pub fn initial_values_fill_in_for_missing_uniforms() -> anyhow::Result<()> {
    let mut runner = TestRunner::new();
    let inputs = Arc::clone(&runner.inputs);
    runner.renderer.set_initial_uniform_value(color_uniform(&inputs, Vec4::ZERO));
    runner.renderer.set_initial_uniform_value(color_uniform(&inputs, Vec4::splat(0.5)));

    let mut node = Node::new();
    node.set_shader_program(Some(program(&inputs)));
    node.add_uniform(model_uniform(&inputs, Mat4::IDENTITY));
    node.add_shape(Shape::new(PrimitiveType::Triangles, position_array(&inputs, &triangle_buffer())));

    runner.draw_scene(&node);

    assert_eq!(runner.gm.args_of("uniform_4fv"), vec![format!("{:?}", (1, &[0.5f32; 4][..]))]);
    assert_eq!(runner.log.count_warnings("No value set"), 0);

    Ok(())
}

#[test]
pub fn uniforms_of_wrong_type_are_rejected() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let result = runner
        .inputs
        .create_uniform("uColor", UniformValue::FloatVector3(Vec3::ONE));

    assert!(result.is_err());

    Ok(())
}

/// A registry whose `uModel` also sets `uTranslation` to its translation.
fn translating_registry() -> anyhow::Result<Arc<ShaderInputRegistry>> {
    let registry = ShaderInputRegistry::new();
    registry.add_attribute_spec(AttributeSpec::new("aPosition", AttributeType::FloatVector3))?;
    registry.add_uniform_spec(UniformSpec::new("uTranslation", UniformType::FloatVector3))?;
    registry.add_uniform_spec(UniformSpec::new("uModel", UniformType::Matrix4).with_generate(Arc::new(
        |model: &Uniform| {
            let UniformValue::Matrix4(matrix) = model.value() else {
                return Vec::new();
            };
            let translation = UniformValue::FloatVector3(matrix.w_axis.truncate());
            model.registry().create_uniform("uTranslation", translation).into_iter().collect()
        },
    )))?;
    Ok(registry)
}

#[test]
pub fn generated_uniforms_follow_their_source() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let registry = translating_registry()?;
    let program = ShaderProgram::from_sources(
        registry.clone(),
        "attribute vec3 aPosition;\nuniform mat4 uModel;\nuniform vec3 uTranslation;\nvoid main() {}\n",
        "void main() {}\n",
    );
    let mut node = Node::new();
    node.set_shader_program(Some(program));
    let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    node.add_uniform(registry.create_uniform("uModel", UniformValue::Matrix4(model))?);
    node.add_shape(Shape::new(PrimitiveType::Triangles, position_array(&registry, &triangle_buffer())));

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    let derived = runner.gm.args_of("uniform_3fv");
    assert_eq!(derived.len(), 1);
    assert!(derived[0].ends_with("[1.0, 2.0, 3.0])"), "{:?}", derived);
    assert!(runner.log.warnings().is_empty(), "{:?}", runner.log.warnings());

    // Same translation, different matrix: only the source is resent.
    node.set_uniform_value(0, UniformValue::Matrix4(model * Mat4::from_scale(Vec3::splat(2.0))))?;
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("uniform_matrix_4fv"), 2);
    assert_eq!(runner.gm.count("uniform_3fv"), 1);

    node.set_uniform_value(0, UniformValue::Matrix4(Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0))))?;
    runner.draw_scene(&node);
    let derived = runner.gm.args_of("uniform_3fv");
    assert_eq!(derived.len(), 2);
    assert!(derived[1].ends_with("[4.0, 5.0, 6.0])"), "{:?}", derived);

    Ok(())
}
