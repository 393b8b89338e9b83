use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, BufferBindingType, ColorTargetState,
    CommandEncoder, Device, FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PrimitiveState, Queue, RenderPipeline, SamplerBindingType, ShaderStages, TextureFormat,
    TextureSampleType, TextureView, TextureViewDimension, VertexState,
};

use super::fullscreen_quad::FULLSCREEN_TRIANGLE_VS;
use crate::config::{OverlayOptions, Rgb, invert_tolerance};
use crate::error::RenderError;
use crate::frame::{FrameSlot, FrameSurface, IDENTITY_TRANSFORM, TexTransform};
use crate::timing::BlendAlpha;

const CHROMA_KEY_FS: &str = include_str!("../../../../assets/shaders/builtin/chroma_key.wgsl");

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ChromaKeyUniforms {
    tex_transform: [[f32; 4]; 4],
    key_color: [f32; 3],
    tolerance: f32,
    silhouette_color: [f32; 3],
    blend_alpha: f32,
    silhouette_mode: u32,
    _pad: [u32; 3],
}

/// Effective shader parameters. `tolerance` holds the already-inverted
/// per-channel threshold (see [`RenderParamsHandle::set_tolerance`]).
#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    pub key_color: Rgb,
    pub silhouette_color: Rgb,
    pub silhouette_mode: bool,
    pub tolerance: f32,
}

impl RenderParams {
    fn from_options(options: &OverlayOptions) -> Self {
        Self {
            key_color: options.key_color.clamped(),
            silhouette_color: options.silhouette_color.clamped(),
            silhouette_mode: options.silhouette_mode,
            tolerance: invert_tolerance(options.tolerance),
        }
    }
}

/// Cloneable setter handle for the keying parameters. Safe from any
/// thread; updates take effect no later than the next draw and never
/// tear (the draw thread copies the whole struct under the lock).
#[derive(Clone)]
pub struct RenderParamsHandle {
    shared: Arc<Mutex<RenderParams>>,
}

impl RenderParamsHandle {
    pub fn set_key_color(&self, color: Rgb) {
        self.lock().key_color = color.clamped();
    }

    pub fn set_silhouette_color(&self, color: Rgb) {
        self.lock().silhouette_color = color.clamped();
    }

    pub fn set_silhouette_mode(&self, on: bool) {
        self.lock().silhouette_mode = on;
    }

    /// Set the keying tolerance. Legacy convention: the stored threshold
    /// is `1 - clamp(|input|, 0, 1)`, so a larger input narrows the
    /// matched color range.
    pub fn set_tolerance(&self, input: f32) {
        self.lock().tolerance = invert_tolerance(input);
    }

    /// Copy of the effective shader parameters.
    pub fn snapshot(&self) -> RenderParams {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RenderParams> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-channel chroma-key classification, mirrored by the fragment
/// shader: a pixel is keyed iff every channel is within `threshold` of
/// the key color.
pub fn is_key_pixel(color: Rgb, key: Rgb, threshold: f32) -> bool {
    (color.r - key.r).abs() <= threshold
        && (color.g - key.g).abs() <= threshold
        && (color.b - key.b).abs() <= threshold
}

/// GPU compositor performing per-frame chroma-key substitution and alpha
/// blending of a single video surface.
///
/// Owned by the draw thread. Decoder threads reach it only through the
/// [`FrameSurface`] mailbox; timer threads only through the shared
/// [`BlendAlpha`]; configuration threads only through
/// [`RenderParamsHandle`].
pub struct ChromaKeyCompositor {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    frame_texture: wgpu::Texture,
    frame_view: TextureView,
    frame_width: u32,
    frame_height: u32,
    transform: TexTransform,
    slot: Arc<FrameSlot>,
    params: Arc<Mutex<RenderParams>>,
    alpha: Arc<BlendAlpha>,
}

impl ChromaKeyCompositor {
    /// Build the pipeline and frame texture, returning the compositor and
    /// the opaque surface handle the external decoder publishes frames
    /// into. Shader or pipeline validation failure is fatal to the
    /// session and carries the compiler/linker log.
    pub fn new(
        device: &Device,
        queue: &Queue,
        target_format: TextureFormat,
        options: &OverlayOptions,
    ) -> Result<(Self, FrameSurface), RenderError> {
        let full_source = format!("{FULLSCREEN_TRIANGLE_VS}\n{CHROMA_KEY_FS}");

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("chroma-key"),
            source: wgpu::ShaderSource::Wgsl(full_source.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("chroma-key shader failed to compile: {err}");
            return Err(RenderError::ShaderCompile(err.to_string()));
        }

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("chroma-key-bgl"),
            entries: &[
                tex_entry(0),
                sampler_entry(1),
                uniform_entry(2, std::mem::size_of::<ChromaKeyUniforms>()),
            ],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("chroma-key-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("chroma-key-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: target_format,
                    // Standard alpha-over: src-alpha / one-minus-src-alpha.
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("chroma-key pipeline failed to link: {err}");
            return Err(RenderError::ProgramLink(err.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chroma-key-uniforms"),
            size: std::mem::size_of::<ChromaKeyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("chroma-key-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        // 1x1 transparent placeholder until the first frame arrives, so
        // the bind group is always valid and draw never stalls.
        let (frame_texture, frame_view) = create_frame_texture(device, 1, 1);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0u8; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let bind_group = create_bind_group(
            device,
            &bind_group_layout,
            &frame_view,
            &sampler,
            &uniform_buffer,
        );

        let slot = Arc::new(FrameSlot::new());
        let params = Arc::new(Mutex::new(RenderParams::from_options(options)));
        let alpha = Arc::new(BlendAlpha::new(1.0));

        log::info!("chroma-key compositor ready ({target_format:?})");

        let surface = FrameSurface::new(slot.clone());
        Ok((
            Self {
                pipeline,
                bind_group_layout,
                bind_group,
                uniform_buffer,
                sampler,
                frame_texture,
                frame_view,
                frame_width: 1,
                frame_height: 1,
                transform: IDENTITY_TRANSFORM,
                slot,
                params,
                alpha,
            },
            surface,
        ))
    }

    /// Handle for updating key/silhouette/tolerance from any thread.
    pub fn params(&self) -> RenderParamsHandle {
        RenderParamsHandle {
            shared: self.params.clone(),
        }
    }

    /// The shared blend alpha the fade scheduler writes into.
    pub fn blend_alpha(&self) -> Arc<BlendAlpha> {
        self.alpha.clone()
    }

    /// True when a published frame is waiting to be drained by `draw`.
    pub fn has_pending_frame(&self) -> bool {
        self.slot.is_dirty()
    }

    /// Record the composited quad into `target`. Draw-thread only.
    ///
    /// Drains the frame mailbox at most once: a pending frame is uploaded
    /// (reallocating the texture when dimensions change) and its transform
    /// latched; otherwise the previously uploaded frame is redrawn.
    pub fn draw(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target: &TextureView,
    ) -> Result<(), RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        if let Some((frame, transform)) = self.slot.drain() {
            self.upload_frame(device, queue, &frame);
            self.transform = transform;
        }

        let params = *self.params.lock().unwrap_or_else(|e| e.into_inner());
        let uniforms = pack_uniforms(&params, self.alpha.get(), self.transform);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("chroma-key"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("GPU error during draw: {err}");
            return Err(RenderError::GraphicsApi(err.to_string()));
        }
        Ok(())
    }

    fn upload_frame(&mut self, device: &Device, queue: &Queue, frame: &crate::frame::DecodedFrame) {
        if frame.width != self.frame_width || frame.height != self.frame_height {
            let (texture, view) = create_frame_texture(device, frame.width, frame.height);
            self.frame_texture = texture;
            self.frame_view = view;
            self.frame_width = frame.width;
            self.frame_height = frame.height;
            self.bind_group = create_bind_group(
                device,
                &self.bind_group_layout,
                &self.frame_view,
                &self.sampler,
                &self.uniform_buffer,
            );
            log::debug!("frame texture reallocated: {}x{}", frame.width, frame.height);
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.frame_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn pack_uniforms(params: &RenderParams, alpha: f32, transform: TexTransform) -> ChromaKeyUniforms {
    ChromaKeyUniforms {
        tex_transform: transform,
        key_color: [params.key_color.r, params.key_color.g, params.key_color.b],
        tolerance: params.tolerance,
        silhouette_color: [
            params.silhouette_color.r,
            params.silhouette_color.g,
            params.silhouette_color.b,
        ],
        blend_alpha: alpha,
        silhouette_mode: u32::from(params.silhouette_mode),
        _pad: [0; 3],
    }
}

fn create_frame_texture(device: &Device, width: u32, height: u32) -> (wgpu::Texture, TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("video-frame"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_bind_group(
    device: &Device,
    layout: &BindGroupLayout,
    frame_view: &TextureView,
    sampler: &wgpu::Sampler,
    uniform_buffer: &wgpu::Buffer,
) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("chroma-key-bg"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(frame_view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
            BindGroupEntry {
                binding: 2,
                resource: uniform_buffer.as_entire_binding(),
            },
        ],
    })
}

fn tex_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32, size: usize) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: std::num::NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f32 = 0.3;
    const GREEN: Rgb = Rgb::GREEN;

    #[test]
    fn keyed_iff_all_channels_within_threshold() {
        // Exactly the key color.
        assert!(is_key_pixel(GREEN, GREEN, T));
        // All channels just inside.
        assert!(is_key_pixel(Rgb::new(0.29, 0.71, 0.29), GREEN, T));
        // One channel outside defeats the match.
        assert!(!is_key_pixel(Rgb::new(0.31, 1.0, 0.0), GREEN, T));
        assert!(!is_key_pixel(Rgb::new(0.0, 0.69, 0.31), GREEN, T));
        // Boundary is inclusive.
        assert!(is_key_pixel(Rgb::new(0.3, 0.7, 0.3), GREEN, T));
    }

    #[test]
    fn per_channel_not_euclidean() {
        // Euclidean distance here is ~0.50 > 0.3, but every channel
        // distance is <= 0.29, so the per-channel test keys it.
        let c = Rgb::new(0.29, 0.71, 0.29);
        assert!(is_key_pixel(c, GREEN, T));
    }

    #[test]
    fn uniforms_pack_inverted_tolerance_and_alpha() {
        let opts = OverlayOptions {
            tolerance: 0.7,
            silhouette_mode: true,
            ..OverlayOptions::default()
        };
        let params = RenderParams::from_options(&opts);
        let u = pack_uniforms(&params, 0.25, IDENTITY_TRANSFORM);
        assert!((u.tolerance - 0.3).abs() < 1e-6);
        assert!((u.blend_alpha - 0.25).abs() < 1e-6);
        assert_eq!(u.silhouette_mode, 1);
        assert_eq!(u.key_color, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn uniform_struct_is_16_byte_aligned() {
        // WGSL uniform layout requires a 16-byte multiple.
        assert_eq!(std::mem::size_of::<ChromaKeyUniforms>() % 16, 0);
    }

    #[test]
    fn params_handle_updates_are_visible_and_idempotent() {
        let shared = Arc::new(Mutex::new(RenderParams::from_options(
            &OverlayOptions::default(),
        )));
        let handle = RenderParamsHandle { shared };

        handle.set_tolerance(0.4);
        let first = handle.snapshot().tolerance;
        handle.set_tolerance(0.4);
        let second = handle.snapshot().tolerance;
        assert_eq!(first, second);
        assert!((first - 0.6).abs() < 1e-6);

        handle.set_key_color(Rgb::new(2.0, -1.0, 0.5));
        let p = handle.snapshot();
        assert_eq!(p.key_color, Rgb::new(1.0, 0.0, 0.5));

        handle.set_silhouette_mode(true);
        assert!(handle.snapshot().silhouette_mode);
    }

    #[test]
    fn params_handle_shared_across_threads() {
        let shared = Arc::new(Mutex::new(RenderParams::from_options(
            &OverlayOptions::default(),
        )));
        let handle = RenderParamsHandle {
            shared: shared.clone(),
        };
        let worker = handle.clone();
        std::thread::spawn(move || worker.set_tolerance(0.9))
            .join()
            .unwrap();
        assert!((handle.snapshot().tolerance - 0.1).abs() < 1e-5);
    }
}
