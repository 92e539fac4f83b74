use glint::{ContextId, Renderer, ThreadKey};
use glint_test::{triangle_node, TestRunner};

fn second_renderer(runner: &TestRunner) -> Renderer {
    Renderer::new(runner.gm.clone(), runner.registry.clone(), Default::default())
}

#[test]
pub fn renderers_keep_resources_of_their_own() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    let second = second_renderer(&runner);
    second.draw_scene(&node);

    assert_eq!(runner.registry.binder_count(), 2);
    assert_eq!(runner.gm.count("gen_buffer"), 2);
    assert_eq!(runner.gm.count("link_program"), 2);

    drop(second);

    assert_eq!(runner.registry.binder_count(), 1);
    assert_eq!(runner.gm.count("delete_buffer"), 1);
    assert_eq!(runner.gm.count("delete_program"), 1);
    assert_ne!(runner.resource_gl_id(&*node.shader_program().cloned().expect("node has a program")), 0);

    Ok(())
}

#[test]
pub fn too_many_binders_warn_once() -> anyhow::Result<()> {
    let runner = TestRunner::builder().binder_warning_threshold(1).build();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);
    assert_eq!(runner.log.count_warnings("resource binders are alive"), 0);

    let renderers: Vec<Renderer> = (0..3).map(|_| second_renderer(&runner)).collect();
    for renderer in &renderers {
        renderer.draw_scene(&node);
    }

    assert_eq!(runner.registry.binder_count(), 4);
    assert_eq!(runner.log.count_warnings("2 resource binders are alive"), 1);
    assert_eq!(runner.log.count_warnings("resource binders are alive"), 1);

    Ok(())
}

#[test]
pub fn each_context_gets_its_own_resources() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    runner.gm.make_current(ContextId(2));
    runner.draw_scene(&node);
    assert_eq!(runner.registry.binder_count(), 2);
    assert_eq!(runner.gm.count("gen_buffer"), 2);
    assert_eq!(runner.gm.count("compile_shader"), 4);

    runner.gm.make_current(ContextId(1));
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("gen_buffer"), 2);
    assert_eq!(runner.gm.count("draw_arrays"), 3);

    Ok(())
}

#[test]
pub fn destroying_another_contexts_binder_abandons() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);
    runner.gm.make_current(ContextId(2));
    runner.draw_scene(&node);

    runner.destroy_binder(ContextId(1));

    assert_eq!(runner.registry.binder_count(), 1);
    assert_eq!(runner.gm.count("delete_buffer"), 0);
    assert_eq!(runner.gm.count("delete_program"), 0);

    runner.destroy_current_binder();

    assert_eq!(runner.registry.binder_count(), 0);
    assert_eq!(runner.gm.count("delete_buffer"), 1);
    assert_eq!(runner.gm.count("delete_program"), 1);
    assert_eq!(runner.gm.count("delete_shader"), 2);

    Ok(())
}

#[test]
pub fn dropping_a_renderer_only_deletes_on_the_current_context() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    let second = second_renderer(&runner);
    second.draw_scene(&node);
    runner.gm.make_current(ContextId(2));
    second.draw_scene(&node);
    runner.gm.make_current(ContextId(1));

    drop(second);

    assert_eq!(runner.registry.binder_count(), 0);
    assert_eq!(runner.gm.count("delete_program"), 1);
    assert_eq!(runner.gm.count("delete_buffer"), 1);

    Ok(())
}

#[test]
pub fn vertex_arrays_are_per_thread_key() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    runner.set_thread_key(Some(ThreadKey(u64::MAX)));
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("gen_vertex_array"), 2);
    assert_eq!(runner.gm.count("gen_buffer"), 1);

    runner.set_thread_key(None);
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("gen_vertex_array"), 2);

    Ok(())
}

#[test]
pub fn concurrent_programs_track_uniforms_per_thread_key() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    node.shader_program().expect("node has a program").set_concurrent(true);
    runner.draw_scene(&node);

    runner.set_thread_key(Some(ThreadKey(u64::MAX)));
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("uniform_4fv"), 2);

    runner.set_thread_key(None);
    runner.draw_scene(&node);
    assert_eq!(runner.gm.count("uniform_4fv"), 2);
    assert_eq!(runner.gm.count("link_program"), 1);

    Ok(())
}

#[test]
pub fn shared_programs_send_uniforms_once_across_thread_keys() -> anyhow::Result<()> {
    let runner = TestRunner::new();
    let node = triangle_node(&runner.inputs);
    runner.draw_scene(&node);

    runner.set_thread_key(Some(ThreadKey(u64::MAX)));
    runner.draw_scene(&node);

    assert_eq!(runner.gm.count("uniform_4fv"), 1);

    Ok(())
}

#[test]
#[should_panic(expected = "ResourceBinder created for context ContextId(1) used while context ContextId(2) is current")]
pub fn binders_refuse_foreign_contexts() {
    let runner = TestRunner::new();
    runner.with_binder(|binder| {
        runner.gm.make_current(ContextId(2));
        binder.verify_context();
    });
}
