use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, anyhow};
use clap::Parser;
use futures::executor::block_on;
use glam::{Mat4, vec3};
use log::info;
use skelbake_model::{
    CrowdConfig, InstanceId, PoseAtlas, SkinnedSkeleton, bake_pose_atlas, update_channel,
};
use skelbake_wgpu::{CameraData, CrowdAnimation};
use wgpu::util::DeviceExt;

#[cfg(feature = "tracing")]
use tracing_subscriber::prelude::*;

mod scene;

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 1024;
const FOV_Y: f32 = 0.5;

// Switch one instance to another clip every this many ticks.
const PLAY_CLIP_INTERVAL: usize = 30;

#[derive(Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// The number of animated instances.
    #[arg(long, default_value_t = 1000)]
    instances: u32,

    /// The number of instances in each row of the grid.
    #[arg(long, default_value_t = 100)]
    columns: u32,

    /// The distance between instances in the grid.
    #[arg(long, default_value_t = 1.0)]
    spacing: f32,

    /// The rate used for baking and playing clips.
    #[arg(long, default_value_t = 10.0)]
    fps: f32,

    /// The number of instance buffers to rotate between.
    #[arg(long, default_value_t = 3)]
    frames_in_flight: usize,

    /// The number of bones in the generated skeleton.
    #[arg(long, default_value_t = 8)]
    bones: usize,

    /// The total simulated time in seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f32,

    /// The number of simulation ticks per second.
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f32,

    /// Save the baked atlas to an OpenEXR file.
    #[arg(long)]
    save_atlas: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    #[cfg(not(feature = "tracing"))]
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .with_module_level("wgpu", log::LevelFilter::Warn)
        .with_module_level("naga", log::LevelFilter::Warn)
        .init()?;

    #[cfg(feature = "tracing")]
    tracing::subscriber::set_global_default(
        tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default()),
    )?;

    let config = CrowdConfig {
        instance_count: cli.instances,
        columns: cli.columns,
        spacing: cli.spacing,
        fps: cli.fps,
        frames_in_flight: cli.frames_in_flight,
    };
    config.validate()?;

    let start = Instant::now();
    let skeleton = scene::skeleton(cli.bones);
    let mesh = scene::mesh(&skeleton);
    let clips = scene::clips(cli.bones);
    let atlas = bake_pose_atlas(&SkinnedSkeleton::new(skeleton), &clips, config.fps)?;
    info!(
        "Baked {}x{} pose atlas in {:?}",
        atlas.width,
        atlas.height,
        start.elapsed()
    );

    if let Some(path) = &cli.save_atlas {
        save_atlas(&atlas, path)?;
        info!("Saved atlas to {path:?}");
    }

    let instance = wgpu::Instance::default();

    let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;

    let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("skelbake device"),
        ..Default::default()
    }))?;

    let (sender, receiver) = update_channel();
    let mut crowd = CrowdAnimation::new(
        &device,
        &queue,
        &atlas,
        &mesh.declaration,
        &config,
        receiver,
    )?;
    crowd.update_camera(&queue, &camera_data(&config));

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("mesh vertex buffer"),
        contents: bytemuck::cast_slice(&mesh.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("mesh index buffer"),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    let size = wgpu::Extent3d {
        width: WIDTH,
        height: HEIGHT,
        depth_or_array_layers: 1,
    };
    let output = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("output"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: skelbake_wgpu::COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let output_view = output.create_view(&Default::default());
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: skelbake_wgpu::DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth.create_view(&Default::default());

    // Playback changes come from a separate simulation thread.
    let tick_count = (cli.seconds * cli.tick_rate).round().max(0.0) as usize;
    let delta_seconds = 1.0 / cli.tick_rate;
    let clip_count = clips.len();
    let instance_count = config.instance_count;
    let simulation = std::thread::spawn(move || {
        for tick in 0..tick_count {
            if sender.tick(delta_seconds).is_err() {
                break;
            }

            if tick % PLAY_CLIP_INTERVAL == 0 {
                let instance = InstanceId((tick as u32).wrapping_mul(7) % instance_count);
                let clip_index = (tick / PLAY_CLIP_INTERVAL) % clip_count;
                if sender.play_clip(instance, clip_index).is_err() {
                    break;
                }
            }
        }
    });

    let start = Instant::now();
    let mut frame_count = 0;
    loop {
        let drained = crowd.process_commands(&queue);
        if drained.count > 0 {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("crowd encoder"),
            });
            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("crowd pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &output_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                crowd.draw(
                    &mut render_pass,
                    &[&vertex_buffer],
                    &index_buffer,
                    mesh.indices.len() as u32,
                );
            }
            queue.submit([encoder.finish()]);
            frame_count += 1;
        }

        if drained.disconnected {
            break;
        }
        std::thread::yield_now();
    }

    simulation
        .join()
        .map_err(|_| anyhow!("simulation thread panicked"))?;

    let elapsed = start.elapsed();
    info!(
        "Rendered {} frames of {} instances in {:?}",
        frame_count, config.instance_count, elapsed
    );

    Ok(())
}

fn camera_data(config: &CrowdConfig) -> CameraData {
    let columns = config.columns.min(config.instance_count) as f32;
    let rows = config.instance_count.div_ceil(config.columns) as f32;
    let center = vec3(columns, 0.0, rows) * config.spacing * 0.5;
    let distance = columns.max(rows) * config.spacing;

    let eye = center + vec3(0.0, distance * 0.5, distance);
    let view = Mat4::look_at_rh(eye, center, glam::Vec3::Y);
    let aspect = WIDTH as f32 / HEIGHT as f32;
    let projection = Mat4::perspective_rh(FOV_Y, aspect, 0.1, distance * 4.0);
    CameraData {
        view_projection: projection * view,
    }
}

fn save_atlas(atlas: &PoseAtlas, path: &Path) -> anyhow::Result<()> {
    let data: Vec<f32> = atlas.pixels.iter().flatten().copied().collect();
    let image = image::Rgba32FImage::from_raw(atlas.width as u32, atlas.height as u32, data)
        .context("atlas dimensions do not match the texel data")?;
    image
        .save(path)
        .with_context(|| format!("failed to save atlas to {path:?}"))?;
    Ok(())
}
