// ============================================
// Demo - Кадр через оба варианта шейдинга
// ============================================
// Демо играет роль хоста: собирает сцену, камеру, солнце, синтетику
// вместо depth-прохода теней, и прогоняет оба пайплайна, записывая
// кадры в PPM. Сам рендер теней и загрузка ассетов - вне стадии.

use std::path::Path;
use std::time::Instant;

use ultraviolet::{Mat4, Vec2, Vec3, Vec4};

use sunlit::lighting::{CascadeSet, ShadowAtlas, ShadowMap, SunLight};
use sunlit::pipeline::executor::{draw_triangles, run_vertex_stage, run_vertex_stage_instanced, Framebuffer};
use sunlit::pipeline::{CascadedPipeline, ShadingPipeline, SingleMapPipeline, Vertex, VertexOutput};
use sunlit::texture::{DepthMap, Texture};
use sunlit::uniforms::{DrawUniforms, FeatureFlags, FrameUniforms, Material};
use sunlit::RenderSettings;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Настройки: путь к JSON первым аргументом, иначе дефолт
    let settings = match std::env::args().nth(1) {
        Some(path) => RenderSettings::load(Path::new(&path))?,
        None => RenderSettings::default(),
    };
    log::info!(
        "frame {}x{}, {} cascades, shadow slice {}px",
        settings.width,
        settings.height,
        settings.cascade_splits.len(),
        settings.shadow_resolution
    );

    let mut frame = FrameUniforms::new();
    frame.sun = SunLight::new(Vec3::new(0.4, 0.8, 0.3), Vec3::new(1.0, 0.98, 0.9), settings.ambient);
    frame.view_position = Vec3::new(10.0, 7.0, 14.0);
    let view = Mat4::look_at(frame.view_position, Vec3::zero(), Vec3::unit_y());
    let proj = ultraviolet::projection::perspective_gl(
        60.0_f32.to_radians(),
        settings.width as f32 / settings.height as f32,
        0.1,
        500.0,
    );
    frame.view_projection = proj * view;

    // Материалы: шахматный albedo, нейтральная normal map, roughness
    let albedo = checkerboard(64, Vec4::new(0.85, 0.8, 0.7, 1.0), Vec4::new(0.35, 0.3, 0.3, 1.0));
    let normal = Texture::solid(Vec4::new(0.5, 0.5, 1.0, 1.0));
    let roughness = Texture::solid(Vec4::new(0.45, 0.0, 0.0, 1.0));
    let material = Material::new(&albedo, &normal, &roughness);

    // Shadow-матрицы на каскад: орто-охват растёт с дистанцией
    let light_view = frame.sun.view_matrix(Vec3::zero());
    let shadow_matrices: Vec<Mat4> = settings
        .cascade_splits
        .iter()
        .map(|&d| {
            ultraviolet::projection::orthographic_gl(-d, d, -d, d, 0.1, 300.0) * light_view
        })
        .collect();
    let cascades = CascadeSet::new(settings.cascade_splits.clone(), shadow_matrices)?;

    // Синтетический атлас вместо depth-прохода: круглый окклюдер
    // в каждой полосе
    let count = cascades.count();
    let mut atlas = ShadowAtlas::new(
        DepthMap::constant(settings.shadow_resolution * count, settings.shadow_resolution, 1.0),
        count,
    );
    stamp_occluders(&mut atlas, settings.shadow_resolution);

    let cascaded = CascadedPipeline::new(frame, cascades, atlas);
    render_scene(&cascaded, &material, &settings, frame, "demo_cascaded.ppm")?;

    // Кадр с подсветкой зон каскадов
    let mut fb = Framebuffer::new(settings.width, settings.height);
    let flags = FeatureFlags { visualize_cascades: true, ..Default::default() };
    let draw = DrawUniforms::new(Mat4::identity()).with_uv_scale(20.0).with_flags(flags);
    let (vertices, indices) = ground_plane(60.0);
    let outputs = run_vertex_stage(&cascaded, &vertices, &draw);
    draw_triangles(&cascaded, &outputs, &indices, &material, &draw, &mut fb);
    fb.write_ppm(Path::new("demo_cascade_zones.ppm"))?;

    // Одиночный вариант: один охват на всю сцену
    let shadow_matrix =
        ultraviolet::projection::orthographic_gl(-60.0, 60.0, -60.0, 60.0, 0.1, 300.0) * light_view;
    let single_map = ShadowMap::new(DepthMap::constant(
        settings.shadow_resolution,
        settings.shadow_resolution,
        1.0,
    ));
    let single = SingleMapPipeline::new(frame, shadow_matrix, single_map);
    render_scene(&single, &material, &settings, frame, "demo_single.ppm")?;

    Ok(())
}

/// Прогнать сцену через пайплайн и записать кадр
fn render_scene<P: ShadingPipeline>(
    pipeline: &P,
    material: &Material<'_>,
    settings: &RenderSettings,
    frame: FrameUniforms,
    out_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut fb = Framebuffer::new(settings.width, settings.height);

    let mut flags = FeatureFlags::default();
    flags.complex_normals = settings.complex_normals;

    // Земля с сильным тайлингом UV
    let ground_model = Mat4::identity();
    let ground_draw = DrawUniforms::new(ground_model)
        .with_mvp(frame.view_projection * ground_model)
        .with_uv_scale(20.0)
        .with_flags(flags);
    let (ground_vertices, ground_indices) = ground_plane(60.0);
    let outputs = run_vertex_stage(pipeline, &ground_vertices, &ground_draw);
    draw_triangles(pipeline, &outputs, &ground_indices, material, &ground_draw, &mut fb);

    // Ряд ящиков инстансами
    let mut box_flags = flags;
    box_flags.instanced = true;
    let box_draw = DrawUniforms::new(Mat4::identity()).with_flags(box_flags);
    let (box_vertices, box_indices) = box_mesh(1.5);
    let instances: Vec<Mat4> = (0..3)
        .map(|i| Mat4::from_translation(Vec3::new(i as f32 * 5.0 - 5.0, 1.5, 0.0)))
        .collect();
    let outputs = run_vertex_stage_instanced(pipeline, &box_vertices, &instances, &box_draw);
    let per_instance = box_vertices.len();
    for (i, _) in instances.iter().enumerate() {
        let base = i * per_instance;
        let instance_outputs: Vec<VertexOutput<P::Varyings>> =
            outputs[base..base + per_instance].to_vec();
        draw_triangles(pipeline, &instance_outputs, &box_indices, material, &box_draw, &mut fb);
    }

    fb.write_ppm(Path::new(out_path))?;
    log::info!("{} rendered in {:.1?}", out_path, start.elapsed());
    Ok(())
}

/// Шахматная текстура
fn checkerboard(size: usize, a: Vec4, b: Vec4) -> Texture {
    let texels = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / 8 + y / 8) % 2 == 0 {
                a
            } else {
                b
            }
        })
        .collect();
    Texture::new(size, size, texels).expect("checkerboard dimensions are consistent")
}

/// Круглый синтетический окклюдер в каждой полосе атласа
fn stamp_occluders(atlas: &mut ShadowAtlas, slice_resolution: usize) {
    let count = atlas.cascade_count();
    let r = slice_resolution as i32 / 6;
    let depth_map = atlas.depth_map_mut();
    for slice in 0..count {
        let cx = (slice * slice_resolution + slice_resolution / 2) as i32;
        let cy = slice_resolution as i32 / 2;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    depth_map.set((cx + dx) as usize, (cy + dy) as usize, 0.4);
                }
            }
        }
    }
}

/// Квадрат земли в плоскости XZ, нормаль вверх
fn ground_plane(half: f32) -> (Vec<Vertex>, Vec<[usize; 3]>) {
    let corners = [
        (Vec3::new(-half, 0.0, -half), Vec2::new(0.0, 0.0)),
        (Vec3::new(half, 0.0, -half), Vec2::new(1.0, 0.0)),
        (Vec3::new(half, 0.0, half), Vec2::new(1.0, 1.0)),
        (Vec3::new(-half, 0.0, half), Vec2::new(0.0, 1.0)),
    ];
    let vertices = corners
        .iter()
        .map(|&(position, uv)| Vertex {
            position,
            tangent: Vec3::unit_x(),
            bitangent: Vec3::unit_z(),
            normal: Vec3::unit_y(),
            uv,
        })
        .collect();
    (vertices, vec![[0, 1, 2], [0, 2, 3]])
}

/// Куб с TBN на каждую грань
fn box_mesh(half: f32) -> (Vec<Vertex>, Vec<[usize; 3]>) {
    // Нормаль, тангенс и битангенс на грань
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::unit_z(), Vec3::unit_x(), Vec3::unit_y()),
        (-Vec3::unit_z(), -Vec3::unit_x(), Vec3::unit_y()),
        (Vec3::unit_x(), -Vec3::unit_z(), Vec3::unit_y()),
        (-Vec3::unit_x(), Vec3::unit_z(), Vec3::unit_y()),
        (Vec3::unit_y(), Vec3::unit_x(), -Vec3::unit_z()),
        (-Vec3::unit_y(), Vec3::unit_x(), Vec3::unit_z()),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(12);
    for (normal, tangent, bitangent) in faces {
        let base = vertices.len();
        for (sx, sy, uv) in [
            (-1.0, -1.0, Vec2::new(0.0, 0.0)),
            (1.0, -1.0, Vec2::new(1.0, 0.0)),
            (1.0, 1.0, Vec2::new(1.0, 1.0)),
            (-1.0, 1.0, Vec2::new(0.0, 1.0)),
        ] {
            vertices.push(Vertex {
                position: (normal + tangent * sx + bitangent * sy) * half,
                tangent,
                bitangent,
                normal,
                uv,
            });
        }
        indices.push([base, base + 1, base + 2]);
        indices.push([base, base + 2, base + 3]);
    }
    (vertices, indices)
}
