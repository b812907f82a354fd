// ============================================
// Executor - Параллельный запуск стадий
// ============================================
// Вершины и пиксели независимы, общего изменяемого состояния нет:
// вершинная стадия - par_iter по вершинам, фрагментная - по строкам
// кадрового буфера (каждая строка принадлежит ровно одной задаче).

use rayon::prelude::*;
use std::io::Write;
use std::path::Path;
use ultraviolet::{Mat4, Vec3, Vec4};

use crate::pipeline::vertex::Interpolate;
use crate::pipeline::{ShadingPipeline, Vertex, VertexOutput};
use crate::uniforms::{DrawUniforms, Material};

/// Кадровый буфер: цвет + глубина
pub struct Framebuffer {
    width: usize,
    height: usize,
    pub color: Vec<Vec4>,
    pub depth: Vec<f32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color: vec![Vec4::new(0.0, 0.0, 0.0, 1.0); width * height],
            depth: vec![f32::INFINITY; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self, color: Vec4) {
        self.color.fill(color);
        self.depth.fill(f32::INFINITY);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Vec4 {
        self.color[y * self.width + x]
    }

    /// Записать кадр в бинарный PPM (P6)
    pub fn write_ppm(&self, path: &Path) -> std::io::Result<()> {
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut bytes = Vec::with_capacity(self.width * self.height * 3);
        for c in &self.color {
            bytes.push((c.x.clamp(0.0, 1.0) * 255.0) as u8);
            bytes.push((c.y.clamp(0.0, 1.0) * 255.0) as u8);
            bytes.push((c.z.clamp(0.0, 1.0) * 255.0) as u8);
        }
        out.write_all(&bytes)
    }
}

/// Вершинная стадия по всем вершинам параллельно
pub fn run_vertex_stage<P: ShadingPipeline>(
    pipeline: &P,
    vertices: &[Vertex],
    draw: &DrawUniforms,
) -> Vec<VertexOutput<P::Varyings>> {
    vertices
        .par_iter()
        .map(|v| pipeline.transform(v, &draw.model, draw))
        .collect()
}

/// Инстансный вариант: матрица модели на каждый инстанс
///
/// Выход уложен инстанс за инстансом, длина instances * vertices.
pub fn run_vertex_stage_instanced<P: ShadingPipeline>(
    pipeline: &P,
    vertices: &[Vertex],
    instance_models: &[Mat4],
    draw: &DrawUniforms,
) -> Vec<VertexOutput<P::Varyings>> {
    instance_models
        .par_iter()
        .flat_map_iter(|model| vertices.iter().map(move |v| pipeline.transform(v, model, draw)))
        .collect()
}

/// Фрагментная стадия по готовому буферу varying'ов
pub fn shade_buffer<P: ShadingPipeline>(
    pipeline: &P,
    fragments: &[P::Varyings],
    material: &Material<'_>,
    draw: &DrawUniforms,
) -> Vec<Vec4> {
    fragments
        .par_iter()
        .map(|f| pipeline.shade(f, material, draw))
        .collect()
}

struct ScreenTriangle<V> {
    // x,y в пикселях, z - глубина NDC
    screen: [Vec3; 3],
    varyings: [V; 3],
    min_y: usize,
    max_y: usize,
}

fn edge(a: Vec3, b: Vec3, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Растеризация треугольников с шейдингом по строкам параллельно
///
/// Интерполяция varying'ов линейная в экранных координатах - для
/// контракта стадии этого достаточно. Треугольники с вершинами за
/// ближней плоскостью (w <= 0) отбрасываются целиком.
pub fn draw_triangles<P: ShadingPipeline>(
    pipeline: &P,
    outputs: &[VertexOutput<P::Varyings>],
    indices: &[[usize; 3]],
    material: &Material<'_>,
    draw: &DrawUniforms,
    fb: &mut Framebuffer,
) {
    let (w, h) = (fb.width, fb.height);

    let triangles: Vec<ScreenTriangle<P::Varyings>> = indices
        .iter()
        .filter_map(|tri| {
            let mut screen = [Vec3::zero(); 3];
            let mut varyings = [outputs[tri[0]].varyings; 3];
            for (i, &index) in tri.iter().enumerate() {
                let out = &outputs[index];
                let clip = out.clip_position;
                if clip.w <= 0.0 {
                    return None;
                }
                let ndc = Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
                screen[i] = Vec3::new(
                    (ndc.x * 0.5 + 0.5) * w as f32,
                    (1.0 - (ndc.y * 0.5 + 0.5)) * h as f32,
                    ndc.z,
                );
                varyings[i] = out.varyings;
            }
            // Вырожденные треугольники пропускаем
            let area = edge(screen[0], screen[1], screen[2].x, screen[2].y);
            if area.abs() < 1e-8 {
                return None;
            }
            let min_y = screen.iter().map(|s| s.y).fold(f32::INFINITY, f32::min);
            let max_y = screen.iter().map(|s| s.y).fold(f32::NEG_INFINITY, f32::max);
            Some(ScreenTriangle {
                screen,
                varyings,
                min_y: (min_y.floor().max(0.0)) as usize,
                max_y: (max_y.ceil().min(h as f32)) as usize,
            })
        })
        .collect();

    fb.color
        .par_chunks_mut(w)
        .zip(fb.depth.par_chunks_mut(w))
        .enumerate()
        .for_each(|(y, (color_row, depth_row))| {
            for tri in &triangles {
                if y < tri.min_y || y >= tri.max_y {
                    continue;
                }
                let [a, b, c] = tri.screen;
                let area = edge(a, b, c.x, c.y);

                let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as usize;
                let max_x = (a.x.max(b.x).max(c.x).ceil() as usize).min(w);
                let py = y as f32 + 0.5;

                for x in min_x..max_x {
                    let px = x as f32 + 0.5;
                    // Деление на знаковую площадь делает веса
                    // неотрицательными для обеих ориентаций
                    let w0 = edge(b, c, px, py) / area;
                    let w1 = edge(c, a, px, py) / area;
                    let w2 = edge(a, b, px, py) / area;
                    if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                        continue;
                    }

                    let z = a.z * w0 + b.z * w1 + c.z * w2;
                    if z >= depth_row[x] {
                        continue;
                    }

                    let weights = Vec3::new(w0, w1, w2);
                    let varyings = <P::Varyings as Interpolate>::interpolate(
                        &tri.varyings[0],
                        &tri.varyings[1],
                        &tri.varyings[2],
                        weights,
                    );
                    depth_row[x] = z;
                    color_row[x] = pipeline.shade(&varyings, material, draw);
                }
            }
        });
}
