use std::sync::Arc;

use glint::{
    manager::PlatformInfo,
    types::{
        Attachment, AttachmentPoint, BufferObject, BufferTarget, BufferUsage, FramebufferObject, ImageFormat, Sampler,
        ShaderStage, UniformType,
    },
    Constant, Feature, Renderer, ResourceHolder, ResourceKind,
};
use glint_test::{triangle_node, vertex_buffer, TestRunner};
use parking_lot::Mutex;

/// Queues a request for the info of `holder` and answers it right away.
fn info_of<H: ResourceHolder>(runner: &TestRunner, holder: &Arc<H>) -> Vec<H::Info> {
    let result = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&result);
    runner
        .resource_manager()
        .request_resource_info(holder, move |infos| *slot.lock() = infos);
    runner.process_resource_info_requests();
    let infos = std::mem::take(&mut *result.lock());
    infos
}

#[test]
pub fn program_info_reports_the_link() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    runner.draw_scene(&node);

    let infos = info_of(&runner, &program);

    assert_eq!(infos.len(), 1);
    let info = &infos[0];
    assert_eq!(info.resource.kind, ResourceKind::ShaderProgram);
    assert_eq!(info.resource.id, runner.resource_gl_id(&*program));
    assert_eq!(info.resource.label, "test program");
    assert!(info.linked);
    assert!(info.info_log.is_empty());
    assert_eq!(info.shaders.len(), 2);
    assert!(info.attributes.iter().any(|input| input.name == "aPosition"));
    let uniforms: Vec<(&str, i32, UniformType)> = info
        .uniforms
        .iter()
        .map(|uniform| (uniform.name.as_str(), uniform.location, uniform.value_type))
        .collect();
    assert_eq!(uniforms, vec![
        ("uModel", 0, UniformType::Matrix4),
        ("uColor", 1, UniformType::FloatVector4),
    ]);

    Ok(())
}

#[test]
pub fn requests_wait_for_the_drawing_thread() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let program = node.shader_program().cloned().expect("node has a program");
    let answered = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&answered);
    runner
        .resource_manager()
        .request_resource_info(&program, move |infos| *slot.lock() = Some(infos.len()));
    assert_eq!(runner.resource_manager().pending_request_count(), 1);
    assert_eq!(*answered.lock(), None);

    // Drawing processes the queue after the tree is walked.
    runner.draw_scene(&node);

    assert_eq!(runner.resource_manager().pending_request_count(), 0);
    assert_eq!(*answered.lock(), Some(1));

    Ok(())
}

#[test]
pub fn holders_without_a_resource_report_nothing() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0]]);

    assert!(info_of(&runner, &buffer).is_empty());

    Ok(())
}

#[test]
pub fn buffer_infos_cover_every_buffer() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);
    let extra = vertex_buffer(&[[1.0, 2.0, 3.0]]);
    runner.create_or_update_resource(&extra);

    let result = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&result);
    runner
        .resource_manager()
        .request_all_resource_infos::<BufferObject, _>(move |infos| *slot.lock() = infos);
    runner.process_resource_info_requests();

    let mut infos = std::mem::take(&mut *result.lock());
    infos.sort_by_key(|info| info.size);
    let summary: Vec<_> = infos.iter().map(|info| (info.target, info.size, info.usage)).collect();
    assert_eq!(summary, vec![
        (BufferTarget::Array, 12, BufferUsage::Static),
        (BufferTarget::Array, 36, BufferUsage::Static),
    ]);
    assert!(infos.iter().all(|info| info.resource.id != 0));

    Ok(())
}

#[test]
pub fn array_and_shader_infos() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    let array = node.shapes()[0].attribute_array.clone().expect("shape has an array");
    let arrays = info_of(&runner, &array);
    assert_eq!(arrays.len(), 1);
    assert_eq!(arrays[0].vertex_count, 3);
    assert_ne!(arrays[0].resource.id, 0);

    let program = node.shader_program().cloned().expect("node has a program");
    let vertex = program.shader(ShaderStage::Vertex).expect("program has a vertex shader");
    let shaders = info_of(&runner, &vertex);
    assert_eq!(shaders.len(), 1);
    assert_eq!(shaders[0].stage, ShaderStage::Vertex);
    assert!(shaders[0].compiled);
    assert!(shaders[0].info_log.is_empty());

    Ok(())
}

#[test]
pub fn framebuffer_info_reports_completeness() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let framebuffer = FramebufferObject::new(16, 16);
    framebuffer.set_attachment(AttachmentPoint::Color0, Attachment::Renderbuffer(ImageFormat::Rgba8));
    runner.create_or_update_resource(&framebuffer);

    let infos = info_of(&runner, &framebuffer);

    assert_eq!(infos.len(), 1);
    assert!(infos[0].is_complete());
    assert_ne!(infos[0].color, 0);
    assert_eq!((infos[0].depth, infos[0].stencil), (0, 0));
    // Updating outside of a frame leaves the default framebuffer bound.
    assert_eq!(runner.gm.args_of("bind_framebuffer").last().map(String::as_str), Some("0"));

    Ok(())
}

#[test]
pub fn sampler_info_reports_parameters() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let sampler = Sampler::new();
    sampler.set_max_anisotropy(4.0);
    runner.create_or_update_resource(&sampler);

    let infos = info_of(&runner, &sampler);

    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].parameters, sampler.parameters());
    assert_ne!(infos[0].resource.id, 0);

    Ok(())
}

#[test]
pub fn platform_info_describes_the_driver() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::GeometryShaders).build();
    let result: Arc<Mutex<Option<PlatformInfo>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&result);
    runner
        .resource_manager()
        .request_platform_info(move |info| *slot.lock() = Some(info));
    runner.process_resource_info_requests();

    let info = result.lock().take().expect("request was answered");
    assert_eq!(info.vendor, "glint");
    assert_eq!(info.renderer, "fake");
    assert!(info.extensions.is_empty());
    assert!(info.limits.contains(&(Constant::MaxTextureImageUnits, 16)));
    assert!(info.features.contains(&Feature::SamplerObjects));
    assert!(!info.features.contains(&Feature::GeometryShaders));

    Ok(())
}

#[test]
pub fn callbacks_may_use_the_renderer() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let renderer = Arc::new(Renderer::new(runner.gm.clone(), runner.registry.clone(), Default::default()));
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0]]);
    renderer.create_or_update_resource(&buffer);
    let usage = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&usage);
    let inner = Arc::clone(&renderer);
    renderer
        .resource_manager()
        .request_platform_info(move |_| *slot.lock() = Some(inner.total_gpu_memory_usage()));
    assert_eq!(renderer.process_resource_info_requests(), 1);

    assert_eq!(*usage.lock(), Some(12));

    Ok(())
}
