use glint::{
    types::{Holder, ShaderStage, ShaderProgram},
    Feature,
};
use glint_test::{triangle_node, TestRunner, FRAGMENT_SOURCE};

#[test]
pub fn source_change_recompiles_and_relinks() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");

    runner.draw_scene(&node);
    let fragment = program.shader(ShaderStage::Fragment).expect("program has a fragment shader");
    fragment.set_source("uniform vec4 uColor;\nuniform float uScale;\nvoid main() {}\n");
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("compile_shader"), 3);
    assert_eq!(runner.gm.count("link_program"), 2);
    assert_eq!(runner.gm.count("create_program"), 1);
    assert_eq!(runner.gm.count("draw_arrays"), 2);
    // The relink forgets what was sent to the old program.
    assert_eq!(runner.gm.count("uniform_4fv"), 2);
    assert_eq!(runner.log.count_warnings("No value set for uniform 'uScale'"), 1);

    Ok(())
}

#[test]
pub fn swapping_a_stage_relinks() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");

    runner.draw_scene(&node);
    program.set_shader(ShaderStage::Fragment, Some(glint::types::Shader::new(FRAGMENT_SOURCE)));
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("create_shader"), 3);
    assert_eq!(runner.gm.count("detach_shader"), 1);
    assert_eq!(runner.gm.count("attach_shader"), 3);
    assert_eq!(runner.gm.count("link_program"), 2);

    Ok(())
}

#[test]
pub fn compile_errors_skip_drawing_until_fixed() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    let fragment = program.shader(ShaderStage::Fragment).expect("program has a fragment shader");
    fragment.set_source("#error broken\nvoid main() {}\n");

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("draw_arrays"), 0);
    assert_eq!(runner.gm.count("compile_shader"), 2);
    let errors = runner.log.errors();
    assert_eq!(
        errors.iter().filter(|error| error.contains("Unable to compile Fragment shader")).count(),
        1,
        "{:?}",
        errors
    );
    assert!(fragment.info_log().contains("'#error' : user error"));

    fragment.set_source(FRAGMENT_SOURCE);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("draw_arrays"), 1);
    assert!(fragment.info_log().is_empty());

    Ok(())
}

#[test]
pub fn missing_vertex_shader_is_reported() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let mut node = triangle_node(&runner.inputs);
    let program = ShaderProgram::new(runner.inputs.clone());
    program.set_shader(ShaderStage::Fragment, Some(glint::types::Shader::new(FRAGMENT_SOURCE)));
    node.set_shader_program(Some(program));

    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("draw_arrays"), 0);
    assert_eq!(runner.gm.count("link_program"), 0);
    assert_eq!(runner.log.count_warnings("has no vertex shader"), 1);

    Ok(())
}

#[test]
pub fn link_errors_are_reported() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    program
        .shader(ShaderStage::Fragment)
        .expect("program has a fragment shader")
        .set_source("uniform vec3 uModel;\nvoid main() {}\n");

    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("draw_arrays"), 0);
    assert_eq!(runner.log.count_warnings("Unable to link shader program \"test program\""), 1);
    assert!(program.info_log().contains("declared with different types"));

    Ok(())
}

#[test]
pub fn unsupported_stages_are_ignored() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::GeometryShaders).build();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    program.set_shader(
        ShaderStage::Geometry,
        Some(glint::types::Shader::new("void main() {}\n")),
    );

    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("create_shader"), 2);
    assert_eq!(runner.gm.count("draw_arrays"), 1);
    assert_eq!(runner.log.count_warnings("the driver lacks GeometryShaders"), 1);

    Ok(())
}

#[test]
pub fn attributes_are_bound_to_registry_locations() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);

    runner.draw_scene(&node);

    let bound = runner.gm.args_of("bind_attrib_location");
    assert!(bound.iter().any(|args| args.ends_with("0, \"aPosition\")")), "{:?}", bound);
    assert!(bound.iter().any(|args| args.ends_with("1, \"aColor\")")), "{:?}", bound);
    assert!(bound.iter().any(|args| args.ends_with("2, \"aOffset\")")), "{:?}", bound);

    Ok(())
}

#[test]
pub fn attributes_the_program_ignores_warn() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    program
        .shader(ShaderStage::Vertex)
        .expect("program has a vertex shader")
        .set_source("uniform mat4 uModel;\nvoid main() {}\n");

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(
        runner
            .log
            .count_warnings("contains attribute 'aPosition' but shader program 'test program' does not"),
        1
    );

    Ok(())
}

#[test]
pub fn relabeling_does_not_relink() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    runner.draw_scene(&node);

    program.set_label("renamed");
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("link_program"), 1);
    assert_eq!(runner.gm.count("uniform_4fv"), 1);
    assert_eq!(runner.gm.count("uniform_matrix_4fv"), 1);
    let id = runner.resource_gl_id(&*program);
    let labels = runner.gm.args_of("object_label");
    assert_eq!(labels.last(), Some(&format!("(Program, {}, \"renamed\")", id)));

    Ok(())
}
