mod common;

use common::{d3d11, gl, solid_pipeline};
use rhal::null::{D3d11Call, GlCall};
use rhal::*;

fn index_buffer(ctx: &mut Context) -> Buffer {
    let indices: [u16; 6] = [0, 1, 2, 2, 1, 3];
    ctx.make_buffer(&BufferDesc {
        size: 12,
        binding_flags: BindingFlags::INDEX_BUFFER,
        usage: Usage::Immutable,
        initial_data: Some(bytemuck::cast_slice(&indices)),
        ..Default::default()
    })
}

fn bind_indices(ctx: &mut Context, buffer: Buffer) {
    ctx.set_vertex_inputs(&VertexInputs {
        index_buffer: Some(buffer),
        index_format: Format::U16x1,
        ..Default::default()
    });
}

#[test]
fn d3d11_instance_count_selects_entry_point() {
    let (mut ctx, probe) = d3d11();
    let pipeline = solid_pipeline(&mut ctx, ColorBlendState::default());
    ctx.set_pipeline(&pipeline);
    probe.clear_calls();

    for instance_count in [0, 1] {
        ctx.draw(&Draw {
            vertex_count: 3,
            start_vertex: 6,
            instance_count,
            start_instance: 0,
        });
    }
    assert_eq!(
        probe.calls(),
        vec![
            D3d11Call::Draw {
                vertex_count: 3,
                start_vertex: 6
            },
            D3d11Call::DrawInstanced {
                vertex_count: 3,
                instance_count: 1,
                start_vertex: 6,
                start_instance: 0
            },
        ]
    );
}

#[test]
fn d3d11_indexed_draws_forward_base_vertex() {
    let (mut ctx, probe) = d3d11();
    let pipeline = solid_pipeline(&mut ctx, ColorBlendState::default());
    let indices = index_buffer(&mut ctx);
    ctx.set_pipeline(&pipeline);
    bind_indices(&mut ctx, indices);
    probe.clear_calls();

    ctx.draw_indexed(&DrawIndexed {
        index_count: 6,
        start_index: 0,
        base_vertex: 4,
        instance_count: 0,
        start_instance: 0,
    });
    ctx.draw_indexed(&DrawIndexed {
        index_count: 6,
        start_index: 3,
        base_vertex: -2,
        instance_count: 5,
        start_instance: 7,
    });
    assert_eq!(
        probe.calls(),
        vec![
            D3d11Call::DrawIndexed {
                index_count: 6,
                start_index: 0,
                base_vertex: 4
            },
            D3d11Call::DrawIndexedInstanced {
                index_count: 6,
                instance_count: 5,
                start_index: 3,
                base_vertex: -2,
                start_instance: 7
            },
        ]
    );
}

#[test]
fn gl_instance_count_selects_entry_point() {
    let (mut ctx, probe) = gl();
    let pipeline = solid_pipeline(&mut ctx, ColorBlendState::default());
    ctx.set_pipeline(&pipeline);
    ctx.set_primitive_type(PrimitiveType::TriangleStrip);
    probe.clear_calls();

    for instance_count in [0, 1] {
        ctx.draw(&Draw {
            vertex_count: 4,
            instance_count,
            ..Default::default()
        });
    }
    let draws: Vec<GlCall> = probe
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GlCall::DrawArrays { .. } | GlCall::DrawArraysInstanced { .. }))
        .collect();
    assert_eq!(
        draws,
        vec![
            GlCall::DrawArrays {
                mode: glow::TRIANGLE_STRIP,
                first: 0,
                count: 4
            },
            GlCall::DrawArraysInstanced {
                mode: glow::TRIANGLE_STRIP,
                first: 0,
                count: 4,
                instances: 1
            },
        ]
    );
}

#[test]
fn gl_indexed_draws_use_byte_offsets() {
    let (mut ctx, probe) = gl();
    let pipeline = solid_pipeline(&mut ctx, ColorBlendState::default());
    let indices = index_buffer(&mut ctx);
    ctx.set_pipeline(&pipeline);
    bind_indices(&mut ctx, indices);
    probe.clear_calls();

    ctx.draw_indexed(&DrawIndexed {
        index_count: 3,
        start_index: 3,
        ..Default::default()
    });
    ctx.draw_indexed(&DrawIndexed {
        index_count: 3,
        start_index: 3,
        base_vertex: 2,
        instance_count: 2,
        ..Default::default()
    });
    let draws: Vec<GlCall> = probe
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                GlCall::DrawElements { .. } | GlCall::DrawElementsInstancedBaseVertex { .. }
            )
        })
        .collect();
    assert_eq!(
        draws,
        vec![
            GlCall::DrawElements {
                mode: glow::TRIANGLES,
                count: 3,
                ty: glow::UNSIGNED_SHORT,
                offset: 6
            },
            GlCall::DrawElementsInstancedBaseVertex {
                mode: glow::TRIANGLES,
                count: 3,
                ty: glow::UNSIGNED_SHORT,
                offset: 6,
                instances: 2,
                base_vertex: 2
            },
        ]
    );
}

#[test]
#[should_panic(expected = "start instance")]
fn gl_rejects_start_instance() {
    let (mut ctx, _probe) = gl();
    let pipeline = solid_pipeline(&mut ctx, ColorBlendState::default());
    ctx.set_pipeline(&pipeline);
    ctx.draw(&Draw {
        vertex_count: 3,
        instance_count: 2,
        start_instance: 1,
        ..Default::default()
    });
}

#[test]
fn gl_vertex_inputs_follow_the_pipeline_layout() {
    let (mut ctx, probe) = gl();
    let mut input_layout = [LayoutDesc::default(); MAX_VERTEX_ATTRIBUTES];
    input_layout[0] = LayoutDesc {
        offset: 0,
        format: Format::F32x3,
        buffer_slot: 0,
        divisor: 0,
    };
    input_layout[1] = LayoutDesc {
        offset: 0,
        format: Format::U8x4Norm,
        buffer_slot: 1,
        divisor: 1,
    };
    let pipeline = ctx.make_pipeline(&PipelineDesc {
        shaders: &common::SHADERS,
        input_layout,
        ..Default::default()
    });
    let data = [0u8; 48];
    let positions = ctx.make_buffer(&BufferDesc {
        size: 48,
        binding_flags: BindingFlags::VERTEX_BUFFER,
        usage: Usage::Immutable,
        initial_data: Some(&data),
        ..Default::default()
    });
    let colors = ctx.make_buffer(&BufferDesc {
        size: 16,
        binding_flags: BindingFlags::VERTEX_BUFFER,
        usage: Usage::Dynamic,
        ..Default::default()
    });

    let mut vertex_buffers = [VertexBufferBinding::default(); MAX_VERTEX_BUFFERS];
    vertex_buffers[0] = VertexBufferBinding {
        buffer: Some(positions),
        offset: 0,
        stride: 12,
    };
    vertex_buffers[1] = VertexBufferBinding {
        buffer: Some(colors),
        offset: 4,
        stride: 4,
    };
    ctx.set_pipeline(&pipeline);
    probe.clear_calls();
    ctx.set_vertex_inputs(&VertexInputs {
        vertex_buffers,
        ..Default::default()
    });

    let calls = probe.calls();
    assert!(calls.contains(&GlCall::VertexAttribPointer {
        index: 0,
        size: 3,
        ty: glow::FLOAT,
        integer: false,
        stride: 12,
        offset: 0
    }));
    assert!(calls.contains(&GlCall::VertexAttribPointer {
        index: 1,
        size: 4,
        ty: glow::UNSIGNED_BYTE,
        integer: false,
        stride: 4,
        offset: 4
    }));
    assert!(calls.contains(&GlCall::VertexAttribDivisor { index: 1, divisor: 1 }));
}
