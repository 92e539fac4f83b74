use anyhow::Context;
use glint::{
    types::{BufferObject, BufferTarget, BufferUsage, DataContainer, Holder, MapMode, MappedDataSource},
    ContextId, Feature, ResourceKind,
};
use glint_test::{triangle_node, vertex_buffer, TestRunner};

fn float_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_ne_bytes()).collect()
}

fn two_vertices() -> (std::sync::Arc<BufferObject>, std::sync::Arc<BufferObject>) {
    let source = vertex_buffer(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let destination = vertex_buffer(&[[0.0; 3]; 2]);
    (source, destination)
}

#[test]
pub fn data_is_uploaded_once() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0]]);

    runner.create_or_update_resource(&buffer);
    runner.create_or_update_resource(&buffer);

    assert_eq!(runner.gm.args_of("buffer_data"), vec!["(Array, 12, Static)"]);
    let id = runner.resource_gl_id(&*buffer);
    assert_eq!(runner.gm.buffer_contents(id), Some(float_bytes(&[1.0, 2.0, 3.0])));
    assert_eq!(runner.gpu_memory_usage(ResourceKind::BufferObject), 12);

    Ok(())
}

#[test]
pub fn wipeable_data_is_dropped_after_upload() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = BufferObject::new(BufferTarget::Array);
    buffer.add_spec(glint::types::ComponentType::Float, 1, 0);
    let data = DataContainer::new(float_bytes(&[1.0, 2.0]), true);
    buffer.set_data(data.clone(), 4, 2, BufferUsage::Dynamic);

    runner.create_or_update_resource(&buffer);

    assert!(data.is_wiped());
    assert_eq!(runner.gm.args_of("buffer_data"), vec!["(Array, 8, Dynamic)"]);

    Ok(())
}

#[test]
pub fn wipeable_data_reaches_every_context() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[0.0; 3]]);
    runner.create_or_update_resource(&buffer);
    runner.gm.make_current(ContextId(2));
    runner.create_or_update_resource(&buffer);

    let data = DataContainer::new(float_bytes(&[1.0, 2.0, 3.0]), true);
    buffer.set_data(data.clone(), 12, 1, BufferUsage::Static);
    runner.create_or_update_resource(&buffer);
    assert!(!data.is_wiped());

    runner.gm.make_current(ContextId(1));
    runner.create_or_update_resource(&buffer);
    assert!(data.is_wiped());

    let on_first = runner.resource_gl_id(&*buffer);
    runner.gm.make_current(ContextId(2));
    let on_second = runner.resource_gl_id(&*buffer);
    assert_ne!(on_first, on_second);
    assert_eq!(runner.gm.buffer_contents(on_first), Some(float_bytes(&[1.0, 2.0, 3.0])));
    assert_eq!(runner.gm.buffer_contents(on_second), Some(float_bytes(&[1.0, 2.0, 3.0])));
    assert_eq!(runner.log.count_warnings("was wiped before this context uploaded it"), 0);

    Ok(())
}

#[test]
pub fn late_contexts_warn_about_wiped_data() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = BufferObject::new(BufferTarget::Array);
    buffer.add_spec(glint::types::ComponentType::Float, 1, 0);
    buffer.set_data(DataContainer::new(float_bytes(&[1.0]), true), 4, 1, BufferUsage::Static);
    buffer.set_label("late");
    runner.create_or_update_resource(&buffer);

    runner.gm.make_current(ContextId(2));
    runner.create_or_update_resource(&buffer);

    assert_eq!(
        runner
            .log
            .count_warnings("Data of buffer \"late\" was wiped before this context uploaded it"),
        1
    );

    Ok(())
}

#[test]
pub fn sub_data_is_applied_in_order() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[0.0; 3]; 2]);
    runner.create_or_update_resource(&buffer);

    buffer.set_sub_data(0, DataContainer::from_slice(&[7.0f32], false));
    buffer.set_sub_data(0, DataContainer::from_slice(&[8.0f32, 9.0], false));
    runner.create_or_update_resource(&buffer);
    runner.create_or_update_resource(&buffer);

    assert_eq!(runner.gm.args_of("buffer_sub_data"), vec!["(Array, 0, 4)", "(Array, 0, 8)"]);
    let id = runner.resource_gl_id(&*buffer);
    let contents = runner.gm.buffer_contents(id).context("buffer exists")?;
    assert_eq!(&contents[..8], float_bytes(&[8.0, 9.0]).as_slice());

    Ok(())
}

#[test]
pub fn copies_use_the_driver_when_available() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let (source, destination) = two_vertices();
    runner.create_or_update_resource(&source);
    runner.create_or_update_resource(&destination);

    destination.copy_sub_data(&source, 0..12, 12);
    runner.create_or_update_resource(&destination);

    assert_eq!(
        runner.gm.args_of("copy_buffer_sub_data"),
        vec!["(CopyRead, CopyWrite, 12, 0, 12)"]
    );
    let id = runner.resource_gl_id(&*destination);
    let contents = runner.gm.buffer_contents(id).context("buffer exists")?;
    assert_eq!(&contents[..12], float_bytes(&[4.0, 5.0, 6.0]).as_slice());

    Ok(())
}

#[test]
pub fn copies_fall_back_to_mapping() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::CopyBufferSubData).build();
    let (source, destination) = two_vertices();
    runner.create_or_update_resource(&source);
    runner.create_or_update_resource(&destination);

    destination.copy_sub_data(&source, 0..12, 12);
    runner.create_or_update_resource(&destination);

    assert_eq!(runner.gm.count("copy_buffer_sub_data"), 0);
    assert_eq!(runner.gm.count("map_buffer_range"), 1);
    let id = runner.resource_gl_id(&*destination);
    let contents = runner.gm.buffer_contents(id).context("buffer exists")?;
    assert_eq!(&contents[..12], float_bytes(&[4.0, 5.0, 6.0]).as_slice());

    Ok(())
}

#[test]
pub fn copies_without_readback_produce_zeroes() -> anyhow::Result<()> {
    let runner = TestRunner::builder()
        .without_feature(Feature::CopyBufferSubData)
        .without_feature(Feature::MapBufferRange)
        .without_feature(Feature::MapBuffer)
        .build();
    let source = BufferObject::new(BufferTarget::Array);
    source.add_spec(glint::types::ComponentType::Float, 3, 0);
    source.set_data(
        DataContainer::new(float_bytes(&[1.0, 2.0, 3.0]), true),
        12,
        1,
        BufferUsage::Static,
    );
    let destination = vertex_buffer(&[[5.0; 3]]);
    runner.create_or_update_resource(&source);
    runner.create_or_update_resource(&destination);

    destination.copy_sub_data(&source, 0..12, 0);
    runner.create_or_update_resource(&destination);

    let id = runner.resource_gl_id(&*destination);
    assert_eq!(runner.gm.buffer_contents(id), Some(vec![0; 12]));
    assert_eq!(runner.log.count_warnings("cannot be read back"), 1);

    Ok(())
}

#[test]
pub fn mapped_writes_reach_the_driver() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0]]);

    runner.map_buffer_object_data(&buffer, MapMode::ReadWrite);
    {
        let mut mapped = buffer.mapped_data();
        let mapped = mapped.as_mut().context("buffer is mapped")?;
        assert_eq!(mapped.source, MappedDataSource::Gpu);
        assert_eq!(mapped.bytes, float_bytes(&[1.0, 2.0, 3.0]));
        mapped.bytes[..4].copy_from_slice(&9.0f32.to_ne_bytes());
    }
    runner.unmap_buffer_object_data(&buffer);

    assert!(!buffer.is_mapped());
    let id = runner.resource_gl_id(&*buffer);
    assert_eq!(runner.gm.buffer_contents(id), Some(float_bytes(&[9.0, 2.0, 3.0])));

    Ok(())
}

#[test]
pub fn mapping_a_range_without_driver_support_uses_client_data() -> anyhow::Result<()> {
    let runner = TestRunner::builder().without_feature(Feature::MapBufferRange).build();
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

    runner.map_buffer_object_data_range(&buffer, MapMode::WriteOnly, 12..24);
    {
        let mut mapped = buffer.mapped_data();
        let mapped = mapped.as_mut().context("buffer is mapped")?;
        assert_eq!(mapped.source, MappedDataSource::DataContainer);
        mapped.bytes.copy_from_slice(&float_bytes(&[7.0, 7.0, 7.0]));
    }
    runner.unmap_buffer_object_data(&buffer);

    assert_eq!(runner.gm.args_of("buffer_sub_data"), vec!["(Array, 12, 12)"]);
    let id = runner.resource_gl_id(&*buffer);
    let contents = runner.gm.buffer_contents(id).context("buffer exists")?;
    assert_eq!(&contents[12..], float_bytes(&[7.0, 7.0, 7.0]).as_slice());

    Ok(())
}

#[test]
pub fn double_maps_and_unmaps_warn() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0]]);

    runner.unmap_buffer_object_data(&buffer);
    runner.map_buffer_object_data(&buffer, MapMode::ReadOnly);
    runner.map_buffer_object_data(&buffer, MapMode::ReadOnly);
    runner.unmap_buffer_object_data(&buffer);

    assert_eq!(runner.log.count_warnings("is not mapped"), 1);
    assert_eq!(runner.log.count_warnings("is already mapped"), 1);
    assert_eq!(runner.gm.count("map_buffer_range"), 1);
    assert_eq!(runner.gm.args_of("unmap_buffer"), vec!["(Array, None)"]);

    Ok(())
}

#[test]
pub fn out_of_range_maps_are_refused() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = vertex_buffer(&[[1.0, 2.0, 3.0]]);

    runner.map_buffer_object_data_range(&buffer, MapMode::ReadOnly, 8..16);

    assert!(!buffer.is_mapped());
    assert_eq!(runner.log.count_warnings("Cannot map range"), 1);

    Ok(())
}

#[test]
pub fn zero_struct_size_is_a_configuration_error() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = BufferObject::new(BufferTarget::Array);
    buffer.set_data(DataContainer::new(vec![0; 12], false), 0, 3, BufferUsage::Static);

    runner.create_or_update_resource(&buffer);

    assert_eq!(runner.gm.count("buffer_data"), 0);
    assert_eq!(runner.log.count_warnings("struct size is 0"), 1);

    Ok(())
}

#[test]
pub fn zero_struct_count_is_a_configuration_error() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let buffer = BufferObject::new(BufferTarget::Array);
    buffer.set_data(DataContainer::new(vec![0; 12], false), 12, 0, BufferUsage::Static);

    runner.create_or_update_resource(&buffer);

    assert_eq!(runner.gm.count("buffer_data"), 0);
    assert_eq!(runner.log.count_warnings("struct count is 0"), 1);

    Ok(())
}

#[test]
pub fn forced_updates_reupload() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    runner.request_forced_updates();
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("buffer_data"), 2);
    assert_eq!(runner.gm.count("link_program"), 2);
    assert_eq!(runner.gm.count("gen_buffer"), 1);

    Ok(())
}
