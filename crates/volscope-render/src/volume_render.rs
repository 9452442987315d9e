//! GPU resources for raymarched volumes and axis-aligned slices.

use glam::Vec3;
use volscope_core::{Actor, ActorKind, Interpolation, PipelineId, RGBA_COMPONENTS};
use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

/// Upper bound on raymarch steps per pixel.
pub const MAX_STEPS: u32 = 2048;

const RENDER_MODE_VOLUME: u32 = 0;
const RENDER_MODE_SLICE: u32 = 1;

/// Uniforms for the volume shader.
/// Layout must match WGSL `VolumeUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct VolumeUniforms {
    /// Texture box minimum (xyz) and ray step length (w).
    pub box_min: [f32; 4],
    /// Texture box maximum (xyz) and opacity reference length (w).
    pub box_max: [f32; 4],
    /// Blend mode index.
    pub blend_mode: u32,
    /// 0 = volume, 1 = slice.
    pub render_mode: u32,
    /// Slice normal axis (0 = X, 1 = Y, 2 = Z).
    pub slice_axis: u32,
    /// World coordinate of the slice plane along `slice_axis`.
    pub slice_position: f32,
    /// Slice color window, in 0..255 units.
    pub color_window: f32,
    /// Slice color level, in 0..255 units.
    pub color_level: f32,
    /// Maximum raymarch steps.
    pub max_steps: u32,
    /// Padding to 16-byte alignment.
    pub _pad: f32,
}

impl VolumeUniforms {
    /// Builds the uniforms for an actor snapshot.
    ///
    /// The texture box spans whole voxels, half a spacing beyond the voxel
    /// centers on every side, so texel centers land on sample positions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_actor(actor: &Actor) -> Self {
        let dataset = &actor.dataset;
        let spacing = dataset.spacing();
        let (box_min, box_max) = actor.render_bounds();
        let reference = spacing.min_element();

        let mut uniforms = Self {
            box_min: [box_min.x, box_min.y, box_min.z, reference],
            box_max: [box_max.x, box_max.y, box_max.z, reference],
            blend_mode: 0,
            render_mode: RENDER_MODE_VOLUME,
            slice_axis: 2,
            slice_position: 0.0,
            color_window: 255.0,
            color_level: 127.0,
            max_steps: MAX_STEPS,
            _pad: 0.0,
        };

        match actor.kind {
            ActorKind::Volume(props) => {
                uniforms.box_min[3] = props.sample_distance;
                uniforms.blend_mode = props.blend_mode.to_index();
            }
            ActorKind::Slice(props) => {
                let axis = props.axis.to_index();
                let index = props.slice_index.unwrap_or(0) as f32;
                uniforms.render_mode = RENDER_MODE_SLICE;
                uniforms.slice_axis = u32::try_from(axis).unwrap_or(2);
                uniforms.slice_position =
                    dataset.origin().to_array()[axis] + index * spacing.to_array()[axis];
                uniforms.color_window = props.color_window;
                uniforms.color_level = props.color_level;
            }
        }
        uniforms
    }

    /// Minimum corner of the texture box.
    #[must_use]
    pub fn box_min(&self) -> Vec3 {
        Vec3::new(self.box_min[0], self.box_min[1], self.box_min[2])
    }

    /// Maximum corner of the texture box.
    #[must_use]
    pub fn box_max(&self) -> Vec3 {
        Vec3::new(self.box_max[0], self.box_max[1], self.box_max[2])
    }
}

/// Creates the bind group layout shared by every volume actor.
pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Volume Bind Group Layout"),
        entries: &[
            // Camera uniforms
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Volume uniforms
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // RGBA volume texture
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            // Sampler
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Fullscreen raymarch pipeline for one output format.
pub struct VolumePass {
    pipeline: wgpu::RenderPipeline,
    format: wgpu::TextureFormat,
}

impl VolumePass {
    /// Creates the pipeline writing to `output_format`.
    pub fn new(
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Volume Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/volume.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Volume Pipeline Layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Volume Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            format: output_format,
        }
    }

    /// Output format this pipeline was built for.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Draws every actor into the pass, in order.
    pub fn draw<'a>(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        actors: impl IntoIterator<Item = &'a VolumeRenderData>,
    ) {
        render_pass.set_pipeline(&self.pipeline);
        for actor in actors {
            render_pass.set_bind_group(0, &actor.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
    }
}

/// GPU resources for one actor.
pub struct VolumeRenderData {
    id: PipelineId,
    revision: u64,
    dimensions: [u32; 3],
    filter: wgpu::FilterMode,
    _texture: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    uniforms: VolumeUniforms,
}

impl VolumeRenderData {
    /// Uploads `actor`'s dataset into a 3D texture and builds its bind group.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bind_group_layout: &wgpu::BindGroupLayout,
        camera_buffer: &wgpu::Buffer,
        actor: &Actor,
    ) -> RenderResult<Self> {
        let dataset = &actor.dataset;
        if dataset.components_per_sample() != RGBA_COMPONENTS {
            return Err(RenderError::TextureCreationFailed(format!(
                "expected {RGBA_COMPONENTS} components per sample, got {}",
                dataset.components_per_sample()
            )));
        }

        let dims = dataset.dimensions().to_array();
        let max_dim = device.limits().max_texture_dimension_3d;
        if dims.iter().any(|&d| d > max_dim) {
            return Err(RenderError::TextureCreationFailed(format!(
                "volume dimensions {dims:?} exceed the device limit of {max_dim}"
            )));
        }

        let size = wgpu::Extent3d {
            width: dims[0],
            height: dims[1],
            depth_or_array_layers: dims[2],
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume 3D Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            dataset.scalars(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims[0] * 4),
                rows_per_image: Some(dims[1]),
            },
            size,
        );
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let filter = filter_mode(actor);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });

        let uniforms = VolumeUniforms::from_actor(actor);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Volume Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Bind Group"),
            layout: bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        log::debug!(
            "uploaded volume texture {}x{}x{} for pipeline {}",
            dims[0],
            dims[1],
            dims[2],
            actor.id.get()
        );

        Ok(Self {
            id: actor.id,
            revision: actor.revision,
            dimensions: dims,
            filter,
            _texture: texture,
            uniform_buffer,
            bind_group,
            uniforms,
        })
    }

    /// Pipeline this data was built for.
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Returns whether `actor` can reuse this texture and only needs new uniforms.
    ///
    /// A rebind bumps the revision, and an interpolation change needs a new
    /// sampler. Anything else only touches the uniform block.
    #[must_use]
    pub fn can_update_in_place(&self, actor: &Actor) -> bool {
        self.id == actor.id
            && self.revision == actor.revision
            && self.dimensions == actor.dataset.dimensions().to_array()
            && self.filter == filter_mode(actor)
    }

    /// Rewrites the uniforms for a changed mapper configuration.
    pub fn update_uniforms(&mut self, queue: &wgpu::Queue, actor: &Actor) {
        self.uniforms = VolumeUniforms::from_actor(actor);
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[self.uniforms]),
        );
    }

    /// Current uniform values.
    #[must_use]
    pub fn uniforms(&self) -> &VolumeUniforms {
        &self.uniforms
    }
}

fn filter_mode(actor: &Actor) -> wgpu::FilterMode {
    match actor.kind {
        ActorKind::Volume(props) => match props.interpolation {
            Interpolation::Nearest => wgpu::FilterMode::Nearest,
            Interpolation::Linear => wgpu::FilterMode::Linear,
        },
        ActorKind::Slice(_) => wgpu::FilterMode::Linear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use volscope_core::{
        BlendMode, GridDataset, SliceProperties, SlicingAxis, UVec3, VolumeProperties,
    };

    fn actor(kind: ActorKind) -> Actor {
        let dims = UVec3::new(4, 3, 2);
        let len = (dims.x * dims.y * dims.z * 4) as usize;
        let dataset = GridDataset::new(
            dims,
            Vec3::new(1.0, 2.0, 0.5),
            Vec3::new(10.0, 0.0, -1.0),
            4,
            vec![0; len],
        )
        .unwrap();
        Actor {
            id: volscope_core::TransferPipeline::volume().id(),
            revision: 1,
            dataset: Arc::new(dataset),
            kind,
        }
    }

    #[test]
    fn test_uniform_size_is_aligned() {
        assert_eq!(std::mem::size_of::<VolumeUniforms>(), 64);
    }

    #[test]
    fn test_volume_uniforms_box_spans_whole_voxels() {
        let uniforms = VolumeUniforms::from_actor(&actor(ActorKind::Volume(
            VolumeProperties::default(),
        )));
        assert_eq!(uniforms.box_min(), Vec3::new(9.5, -1.0, -1.25));
        assert_eq!(uniforms.box_max(), Vec3::new(13.5, 5.0, -0.25));
        assert_eq!(uniforms.render_mode, RENDER_MODE_VOLUME);
        assert_eq!(uniforms.box_min[3], 1.5);
    }

    #[test]
    fn test_fitted_camera_sees_whole_texture_box() {
        let dataset =
            GridDataset::with_unit_spacing(UVec3::splat(2), 4, vec![255; 32]).unwrap();
        let actor = Actor {
            id: volscope_core::TransferPipeline::volume().id(),
            revision: 1,
            dataset: Arc::new(dataset),
            kind: ActorKind::Volume(VolumeProperties::default()),
        };
        let uniforms = VolumeUniforms::from_actor(&actor);
        let (min, max) = (uniforms.box_min(), uniforms.box_max());
        assert_eq!((min, max), actor.render_bounds());

        let mut camera = crate::camera::Camera::new(1.5);
        camera.reset_to_bounds(min, max);
        let view_proj = camera.view_projection_matrix();
        for x in [min.x, max.x] {
            for y in [min.y, max.y] {
                for z in [min.z, max.z] {
                    let ndc = view_proj.project_point3(Vec3::new(x, y, z));
                    assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{ndc:?}");
                    assert!((0.0..=1.0).contains(&ndc.z), "{ndc:?}");
                }
            }
        }
    }

    #[test]
    fn test_volume_uniforms_blend_mode() {
        let props = VolumeProperties {
            blend_mode: BlendMode::MaximumIntensity,
            sample_distance: 0.25,
            ..VolumeProperties::default()
        };
        let uniforms = VolumeUniforms::from_actor(&actor(ActorKind::Volume(props)));
        assert_eq!(uniforms.blend_mode, BlendMode::MaximumIntensity.to_index());
        assert_eq!(uniforms.box_min[3], 0.25);
        assert_eq!(uniforms.box_max[3], 0.5);
    }

    #[test]
    fn test_slice_uniforms_position() {
        let props = SliceProperties {
            axis: SlicingAxis::Y,
            color_window: 100.0,
            color_level: 50.0,
            slice_index: Some(2),
        };
        let uniforms = VolumeUniforms::from_actor(&actor(ActorKind::Slice(props)));
        assert_eq!(uniforms.render_mode, RENDER_MODE_SLICE);
        assert_eq!(uniforms.slice_axis, 1);
        assert_eq!(uniforms.slice_position, 4.0);
        assert_eq!(uniforms.color_window, 100.0);
        assert_eq!(uniforms.color_level, 50.0);
    }
}
