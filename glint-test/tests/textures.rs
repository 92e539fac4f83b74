use std::sync::Arc;

use glam::{Mat4, UVec2, Vec4};
use glint::{
    manager::TextureInfo,
    types::{
        DataContainer, FilterMode, Holder, Image, ImageFormat, Node, PrimitiveType, Sampler, ShaderInputRegistry,
        ShaderProgram, Shape, Texture, UniformValue, WrapMode,
    },
    Feature, ResourceKind,
};
use glint_test::{
    color_uniform, model_uniform, position_array, texture, textured_program, triangle_buffer, TestRunner,
};
use parking_lot::Mutex;

fn sampled_texture(width: u32, height: u32) -> Arc<Texture> {
    with_sampler(width, height, Sampler::new())
}

fn with_sampler(width: u32, height: u32, sampler: Arc<Sampler>) -> Arc<Texture> {
    let texture = texture(width, height);
    texture.set_sampler(Some(sampler));
    texture
}

fn textured_node(registry: &Arc<ShaderInputRegistry>, program: &Arc<ShaderProgram>, texture: &Arc<Texture>) -> Node {
    let mut node = Node::new();
    node.set_shader_program(Some(program.clone()));
    node.add_uniform(model_uniform(registry, Mat4::IDENTITY));
    node.add_uniform(color_uniform(registry, Vec4::ONE));
    node.add_uniform(
        registry
            .create_uniform("uTexture", UniformValue::Texture(texture.clone()))
            .expect("uTexture is registered"),
    );
    node.add_shape(Shape::new(
        PrimitiveType::Triangles,
        position_array(registry, &triangle_buffer()),
    ));
    node
}

fn texture_info(runner: &TestRunner, texture: &Arc<Texture>) -> Option<TextureInfo> {
    let result = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&result);
    runner
        .resource_manager()
        .request_resource_info(texture, move |infos| *slot.lock() = infos.into_iter().next());
    runner.process_resource_info_requests();
    let info = result.lock().take();
    info
}

#[test]
pub fn texture_is_uploaded_and_bound() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let texture = sampled_texture(4, 4);
    let node = textured_node(&runner.inputs, &textured_program(&runner.inputs), &texture);

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.args_of("tex_image_2d"), vec!["(Texture2D, 0, Rgba8, 4, 4, Some(64))"]);
    assert_eq!(runner.gm.count("generate_mipmap"), 1);
    assert_eq!(runner.gm.count("gen_texture"), 1);
    assert_eq!(runner.gm.args_of("uniform_1iv"), vec![format!("{:?}", (2, &[0][..]))]);
    assert_eq!(runner.gm.count("draw_arrays"), 2);
    assert!(runner.log.warnings().is_empty(), "{:?}", runner.log.warnings());

    let image = texture.image(0).expect("level 0 is set");
    assert!(image.data().expect("image has a container").is_wiped());
    // 64 bytes plus a third for the generated mip chain.
    assert_eq!(runner.gpu_memory_usage(ResourceKind::Texture), 85);

    Ok(())
}

#[test]
pub fn textures_without_sampler_are_not_bound() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let texture = texture(4, 4);
    texture.set_label("bare");
    let node = textured_node(&runner.inputs, &textured_program(&runner.inputs), &texture);

    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("gen_texture"), 0);
    assert_eq!(runner.gm.count("uniform_1iv"), 0);
    assert_eq!(runner.log.count_warnings("Texture \"bare\" has no sampler and cannot be bound"), 1);
    assert_eq!(runner.log.count_warnings("could not be bound to image units"), 1);

    Ok(())
}

#[test]
pub fn least_recently_used_unit_is_reassigned() -> anyhow::Result<()> {
    let mut runner = TestRunner::new();
    runner.renderer.set_texture_image_unit_range(0..=1);
    let program = textured_program(&runner.inputs);
    let textures: Vec<_> = (0..3).map(|_| sampled_texture(4, 4)).collect();
    let mut root = Node::new();
    for texture in &textures {
        root.add_child(textured_node(&runner.inputs, &program, texture));
    }

    runner.draw_scene(&root);

    assert_eq!(runner.gm.args_of("uniform_1iv"), vec![
        format!("{:?}", (2, &[0][..])),
        format!("{:?}", (2, &[1][..])),
        format!("{:?}", (2, &[0][..])),
    ]);
    let units: Vec<Option<u32>> = textures
        .iter()
        .map(|texture| texture_info(&runner, texture).and_then(|info| info.unit))
        .collect();
    assert_eq!(units, vec![None, Some(1), Some(0)]);

    Ok(())
}

#[test]
pub fn sampler_objects_carry_the_parameters() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let sampler = Sampler::new();
    let texture = with_sampler(4, 4, sampler.clone());
    let node = textured_node(&runner.inputs, &textured_program(&runner.inputs), &texture);

    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("gen_sampler"), 1);
    assert_eq!(runner.gm.count("sampler_parameter"), 10);
    assert_eq!(runner.gm.count("bind_sampler"), 1);
    assert!(runner.gm.args_of("tex_parameter").is_empty());

    sampler.set_min_filter(FilterMode::Linear);
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("sampler_parameter"), 11);
    let info = texture_info(&runner, &texture).expect("texture has a resource");
    assert_eq!(info.sampler, runner.resource_gl_id(&*sampler));
    assert_eq!((info.width, info.height, info.format), (4, 4, Some(ImageFormat::Rgba8)));

    Ok(())
}

#[test]
pub fn texture_parameters_replace_missing_sampler_objects() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::SamplerObjects).build();
    let sampler = Sampler::new();
    sampler.set_min_filter(FilterMode::Linear);
    let texture = with_sampler(4, 4, sampler.clone());
    let node = textured_node(&runner.inputs, &textured_program(&runner.inputs), &texture);

    // Only what differs from the driver defaults is sent.
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("gen_sampler"), 0);
    assert_eq!(
        runner.gm.args_of("tex_parameter"),
        vec!["(Texture2D, Sampler(MinFilter(Linear)))"]
    );

    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("tex_parameter"), 1);

    sampler.set_wrap_s(WrapMode::ClampToEdge);
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("tex_parameter"), 2);

    Ok(())
}

#[test]
pub fn npot_textures_need_driver_support_to_repeat() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::NpotTextures).build();
    let repeating = sampled_texture(3, 5);
    let program = textured_program(&runner.inputs);
    let node = textured_node(&runner.inputs, &program, &repeating);

    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("gen_texture"), 0);
    assert_eq!(runner.log.count_warnings("non-power-of-two size"), 1);

    let sampler = Sampler::new();
    sampler.set_wrap_modes(WrapMode::ClampToEdge);
    sampler.set_min_filter(FilterMode::Linear);
    let clamped = with_sampler(3, 5, sampler);
    runner.draw_scene(&textured_node(&runner.inputs, &program, &clamped));

    assert_eq!(runner.gm.count("gen_texture"), 1);

    Ok(())
}

#[test]
pub fn sub_images_are_applied_once() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let texture = sampled_texture(4, 4);
    let node = textured_node(&runner.inputs, &textured_program(&runner.inputs), &texture);
    runner.draw_scene(&node);

    texture.set_sub_image(
        0,
        UVec2::new(1, 1),
        Image::new(ImageFormat::Rgba8, 2, 2, Some(DataContainer::new(vec![0; 16], false))),
    );
    runner.draw_scene(&node);
    runner.draw_scene(&node);

    assert_eq!(
        runner.gm.args_of("tex_sub_image_2d"),
        vec!["(Texture2D, 0, 1, 1, 2, 2, Rgba8, 16)"]
    );
    assert_eq!(runner.gm.count("tex_image_2d"), 1);

    Ok(())
}

#[test]
pub fn new_images_are_reuploaded() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let texture = sampled_texture(4, 4);
    let node = textured_node(&runner.inputs, &textured_program(&runner.inputs), &texture);
    runner.draw_scene(&node);

    texture.set_image(
        0,
        Some(Image::new(ImageFormat::Rgba8, 8, 8, Some(DataContainer::new(vec![0; 256], true)))),
    );
    runner.draw_scene(&node);

    assert_eq!(
        runner.gm.args_of("tex_image_2d").last().map(String::as_str),
        Some("(Texture2D, 0, Rgba8, 8, 8, Some(256))")
    );
    assert_eq!(runner.gm.count("gen_texture"), 1);
    let info = texture_info(&runner, &texture).expect("texture has a resource");
    assert_eq!((info.width, info.height), (8, 8));

    Ok(())
}
