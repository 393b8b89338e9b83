//! Headless demo: synthetic green-screen frames through the full
//! pipeline into an offscreen target, then a readback that counts how
//! many pixels were keyed out.
//!
//! Run with `RUST_LOG=info cargo run --example headless`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chroma_overlay::config::OverlayOptions;
use chroma_overlay::frame::{DecodedFrame, FrameSurface};
use chroma_overlay::gpu::{ChromaKeyCompositor, GpuContext, RenderTarget};
use chroma_overlay::player::{MediaBackend, PlaybackController, VideoMetadata};
use chroma_overlay::timing::FadeScheduler;

const SIZE: u32 = 64;
const DURATION_MS: u64 = 2_000;

/// Toy decoder: a thread that publishes a red square on a green
/// background at ~30fps while playing.
struct SyntheticBackend {
    surface: Option<FrameSurface>,
    playing: Arc<AtomicBool>,
    started_at: Option<Instant>,
}

impl SyntheticBackend {
    fn new() -> Self {
        Self {
            surface: None,
            playing: Arc::new(AtomicBool::new(false)),
            started_at: None,
        }
    }
}

fn synthetic_frame(tick: u32) -> DecodedFrame {
    let mut data = vec![0u8; (SIZE * SIZE * 4) as usize];
    let offset = (tick % (SIZE / 2)) as u32;
    for y in 0..SIZE {
        for x in 0..SIZE {
            let i = ((y * SIZE + x) * 4) as usize;
            let in_square = x >= offset && x < offset + 16 && y >= 16 && y < 48;
            if in_square {
                data[i] = 255; // red square
                data[i + 3] = 255;
            } else {
                data[i + 1] = 255; // green background
                data[i + 3] = 255;
            }
        }
    }
    DecodedFrame {
        data,
        width: SIZE,
        height: SIZE,
    }
}

impl MediaBackend for SyntheticBackend {
    fn attach_surface(&mut self, surface: FrameSurface) {
        self.surface = Some(surface);
    }

    fn prepare(&mut self) -> Result<(), chroma_overlay::DataSourceError> {
        Ok(())
    }

    fn start(&mut self) {
        let Some(surface) = self.surface.clone() else {
            return;
        };
        self.playing.store(true, Ordering::SeqCst);
        self.started_at = Some(Instant::now());
        let playing = self.playing.clone();
        std::thread::spawn(move || {
            let mut tick = 0u32;
            while playing.load(Ordering::SeqCst) {
                surface.publish_frame(synthetic_frame(tick));
                tick += 1;
                std::thread::sleep(Duration::from_millis(33));
            }
        });
    }

    fn pause(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn reset(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn seek(&mut self, _position_ms: u64) {}

    fn position_ms(&self) -> u64 {
        self.started_at
            .map_or(0, |t| t.elapsed().as_millis() as u64)
    }

    fn set_looping(&mut self, _looping: bool) {}
}

fn main() -> Result<()> {
    env_logger::init();

    let gpu = GpuContext::new().context("GPU init failed")?;
    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let options = OverlayOptions {
        fade_in_delay_ms: 0,
        fade_in_duration_ms: 300,
        fade_out_lead_ms: 500,
        fade_out_duration_ms: 300,
        ..OverlayOptions::default()
    };

    let (mut compositor, surface) =
        ChromaKeyCompositor::new(&gpu.device, &gpu.queue, format, &options)?;
    let fades = Arc::new(FadeScheduler::new(compositor.blend_alpha()));
    let controller = PlaybackController::new(SyntheticBackend::new(), options, fades.clone());
    controller.set_on_video_started(|| log::info!("video started"));
    controller.set_on_video_ended(|| log::info!("video ended"));

    controller.surface_ready(surface)?;
    controller.set_data_source(VideoMetadata {
        width: SIZE,
        height: SIZE,
        duration_ms: DURATION_MS,
    })?;
    // The synthetic decoder is ready immediately.
    controller.on_prepared();

    let target = RenderTarget::new(&gpu.device, SIZE, SIZE, format, "demo-target");
    let started = Instant::now();
    while started.elapsed() < Duration::from_millis(DURATION_MS) {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("demo-frame"),
            });
        compositor.draw(&gpu.device, &gpu.queue, &mut encoder, &target.view)?;
        gpu.queue.submit([encoder.finish()]);
        std::thread::sleep(Duration::from_millis(16));
    }
    controller.on_completed();

    let pixels = read_back(&gpu, &target)?;
    let keyed = pixels.chunks_exact(4).filter(|px| px[3] == 0).count();
    log::info!(
        "final frame: {keyed}/{} pixels keyed out, alpha now {:.2}",
        (SIZE * SIZE) as usize,
        fades.alpha().get()
    );

    controller.release();
    Ok(())
}

fn read_back(gpu: &GpuContext, target: &RenderTarget) -> Result<Vec<u8>> {
    let bytes_per_row = target.width * 4; // 64px rows are already 256-aligned
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: u64::from(bytes_per_row * target.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(target.height),
            },
        },
        wgpu::Extent3d {
            width: target.width,
            height: target.height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit([encoder.finish()]);

    let slice = buffer.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("device poll failed")?;
    rx.recv()??;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}
