// ============================================
// Vertex Stage - Преобразования вершин
// ============================================
// Перевод вершины из object space во все пространства, нужные
// фрагментной стадии. Два варианта: CSM-пайплайн уводит освещение
// в касательное пространство ещё на вершине, одиночный передаёт
// сырой TBN-базис и откладывает смену базиса до фрагмента.

use ultraviolet::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::lighting::{CascadeSet, MAX_CASCADES};
use crate::uniforms::{DrawUniforms, FrameUniforms};

/// Вершина меша
///
/// Tangent/bitangent/normal - орто(нормированный) базис от импортёра
/// мешей; здесь он не ортогонализуется, только перенормируется.
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub position: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Выход вершинной стадии: clip-позиция + varying-набор
#[derive(Clone, Copy, Debug)]
pub struct VertexOutput<V> {
    pub clip_position: Vec4,
    pub varyings: V,
}

/// Varying-набор CSM-варианта
///
/// Векторы освещения уже в касательном пространстве: дешевле на
/// фрагмент, но интерполяция копит дрейф - фрагментная стадия
/// перенормирует.
#[derive(Clone, Copy, Debug)]
pub struct CascadedVaryings {
    pub sun_dir_tangent: Vec3,
    pub view_pos_tangent: Vec3,
    pub position_tangent: Vec3,
    /// Shadow-позиция на каждый каскад (хвост массива не используется)
    pub shadow_positions: [Vec4; MAX_CASCADES],
    pub world_position: Vec3,
    pub uv: Vec2,
    /// Глубина в пространстве камеры для выбора каскада
    pub view_depth: f32,
}

/// Varying-набор одиночного варианта
///
/// Несёт сам TBN-базис (строки T,B,N в мировых координатах) и меняет
/// базис на фрагменте: дороже, но интерполируется базис, а не уже
/// преобразованные векторы.
#[derive(Clone, Copy, Debug)]
pub struct SingleVaryings {
    /// Строки - мировые T, B, N
    pub tbn: Mat3,
    pub world_position: Vec3,
    pub shadow_position: Vec4,
    pub uv: Vec2,
}

/// Матрица коррекции нормалей: transpose(inverse(model_3x3))
///
/// В отличие от самой model-матрицы корректно переносит нормали
/// при неравномерном масштабе.
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    let upper = Mat3::new(
        Vec3::new(model.cols[0].x, model.cols[0].y, model.cols[0].z),
        Vec3::new(model.cols[1].x, model.cols[1].y, model.cols[1].z),
        Vec3::new(model.cols[2].x, model.cols[2].y, model.cols[2].z),
    );
    upper.inversed().transposed()
}

/// Смена базиса в касательное пространство: строки - T, B, N
///
/// Базис ортонормирован, так что транспонирование равно обращению;
/// умножение этой матрицы на вектор переводит его В касательное
/// пространство.
pub fn tangent_basis(tangent: Vec3, bitangent: Vec3, normal: Vec3) -> Mat3 {
    // Mat3::new принимает столбцы, поэтому транспонируем
    Mat3::new(tangent, bitangent, normal).transposed()
}

/// Перенести и перенормировать TBN вершины
fn corrected_basis(vertex: &Vertex, nm: &Mat3) -> Mat3 {
    let t = (*nm * vertex.tangent).normalized();
    let b = (*nm * vertex.bitangent).normalized();
    let n = (*nm * vertex.normal).normalized();
    tangent_basis(t, b, n)
}

/// Вершинная стадия CSM-варианта
pub fn transform_cascaded(
    vertex: &Vertex,
    model: &Mat4,
    frame: &FrameUniforms,
    cascades: &CascadeSet,
    draw: &DrawUniforms,
) -> VertexOutput<CascadedVaryings> {
    let world = *model * Vec4::new(vertex.position.x, vertex.position.y, vertex.position.z, 1.0);
    let world_position = Vec3::new(world.x, world.y, world.z);
    let clip_position = frame.view_projection * world;

    let tbn = corrected_basis(vertex, &normal_matrix(model));

    let mut shadow_positions = [Vec4::zero(); MAX_CASCADES];
    for (slot, matrix) in shadow_positions.iter_mut().zip(cascades.matrices()) {
        *slot = *matrix * world;
    }

    VertexOutput {
        clip_position,
        varyings: CascadedVaryings {
            sun_dir_tangent: tbn * frame.sun.direction,
            view_pos_tangent: tbn * frame.view_position,
            position_tangent: tbn * world_position,
            shadow_positions,
            world_position,
            uv: vertex.uv * draw.uv_scale + draw.uv_offset,
            // Для перспективной проекции w клип-позиции и есть глубина
            // в пространстве камеры
            view_depth: clip_position.w,
        },
    }
}

/// Вершинная стадия одиночного варианта
pub fn transform_single(
    vertex: &Vertex,
    model: &Mat4,
    shadow_matrix: &Mat4,
    frame: &FrameUniforms,
    draw: &DrawUniforms,
) -> VertexOutput<SingleVaryings> {
    let world = *model * Vec4::new(vertex.position.x, vertex.position.y, vertex.position.z, 1.0);
    let world_position = Vec3::new(world.x, world.y, world.z);

    // Неинстансный вариант берёт готовое mvp хоста, инстансный
    // собирает его из view_projection и матрицы инстанса
    let mvp = if draw.flags.instanced {
        frame.view_projection * *model
    } else {
        draw.mvp
    };
    let clip_position = mvp * Vec4::new(vertex.position.x, vertex.position.y, vertex.position.z, 1.0);

    VertexOutput {
        clip_position,
        varyings: SingleVaryings {
            tbn: corrected_basis(vertex, &normal_matrix(model)),
            world_position,
            shadow_position: *shadow_matrix * world,
            uv: vertex.uv * draw.uv_scale + draw.uv_offset,
        },
    }
}

/// Линейная интерполяция varying'ов барицентрическими весами
pub trait Interpolate: Copy {
    fn interpolate(a: &Self, b: &Self, c: &Self, w: Vec3) -> Self;
}

impl Interpolate for CascadedVaryings {
    fn interpolate(a: &Self, b: &Self, c: &Self, w: Vec3) -> Self {
        let mut shadow_positions = [Vec4::zero(); MAX_CASCADES];
        for i in 0..MAX_CASCADES {
            shadow_positions[i] = a.shadow_positions[i] * w.x
                + b.shadow_positions[i] * w.y
                + c.shadow_positions[i] * w.z;
        }
        Self {
            sun_dir_tangent: a.sun_dir_tangent * w.x + b.sun_dir_tangent * w.y + c.sun_dir_tangent * w.z,
            view_pos_tangent: a.view_pos_tangent * w.x + b.view_pos_tangent * w.y + c.view_pos_tangent * w.z,
            position_tangent: a.position_tangent * w.x + b.position_tangent * w.y + c.position_tangent * w.z,
            shadow_positions,
            world_position: a.world_position * w.x + b.world_position * w.y + c.world_position * w.z,
            uv: a.uv * w.x + b.uv * w.y + c.uv * w.z,
            view_depth: a.view_depth * w.x + b.view_depth * w.y + c.view_depth * w.z,
        }
    }
}

impl Interpolate for SingleVaryings {
    fn interpolate(a: &Self, b: &Self, c: &Self, w: Vec3) -> Self {
        let tbn = Mat3::new(
            a.tbn.cols[0] * w.x + b.tbn.cols[0] * w.y + c.tbn.cols[0] * w.z,
            a.tbn.cols[1] * w.x + b.tbn.cols[1] * w.y + c.tbn.cols[1] * w.z,
            a.tbn.cols[2] * w.x + b.tbn.cols[2] * w.y + c.tbn.cols[2] * w.z,
        );
        Self {
            tbn,
            world_position: a.world_position * w.x + b.world_position * w.y + c.world_position * w.z,
            shadow_position: a.shadow_position * w.x + b.shadow_position * w.y + c.shadow_position * w.z,
            uv: a.uv * w.x + b.uv * w.y + c.uv * w.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ultraviolet::Mat4;

    fn flat_vertex() -> Vertex {
        Vertex {
            position: Vec3::zero(),
            tangent: Vec3::unit_x(),
            bitangent: Vec3::unit_y(),
            normal: Vec3::unit_z(),
            uv: Vec2::new(0.25, 0.75),
        }
    }

    #[test]
    fn test_normal_matrix_handles_nonuniform_scale() {
        // Масштаб (2,1,1): нормаль (1,1,0)/sqrt2 должна повернуться,
        // если бы её переносили model-матрицей - осталась бы не той
        let model = Mat4::new(
            Vec4::new(2.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        );
        let nm = normal_matrix(&model);

        let n = (nm * Vec3::new(1.0, 1.0, 0.0).normalized()).normalized();
        // Правильная нормаль плоскости x+2y=c после масштаба по x
        let expected = Vec3::new(0.5, 1.0, 0.0).normalized();
        assert_relative_eq!(n.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(n.y, expected.y, epsilon = 1e-5);
    }

    #[test]
    fn test_tangent_basis_moves_vectors_into_tangent_space() {
        // Базис повернут: T=+Y, B=+Z, N=+X
        let tbn = tangent_basis(Vec3::unit_y(), Vec3::unit_z(), Vec3::unit_x());
        // Мировой +X это нормаль, в касательном пространстве - (0,0,1)
        let v = tbn * Vec3::unit_x();
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(v.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_uv_scale_and_offset() {
        let frame = FrameUniforms::default();
        let cascades = CascadeSet::new(vec![10.0], vec![Mat4::identity()]).unwrap();
        let draw = DrawUniforms::new(Mat4::identity())
            .with_uv_scale(20.0);

        let out = transform_cascaded(&flat_vertex(), &Mat4::identity(), &frame, &cascades, &draw);
        assert_relative_eq!(out.varyings.uv.x, 5.0);
        assert_relative_eq!(out.varyings.uv.y, 15.0);
    }

    #[test]
    fn test_cascaded_shadow_positions_per_cascade() {
        let frame = FrameUniforms::default();
        let m0 = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let m1 = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        let cascades = CascadeSet::new(vec![10.0, 20.0], vec![m0, m1]).unwrap();
        let draw = DrawUniforms::new(Mat4::identity());

        let out = transform_cascaded(&flat_vertex(), &Mat4::identity(), &frame, &cascades, &draw);
        assert_relative_eq!(out.varyings.shadow_positions[0].x, 1.0);
        assert_relative_eq!(out.varyings.shadow_positions[1].x, 2.0);
        // Хвост массива пустой
        assert_relative_eq!(out.varyings.shadow_positions[2].w, 0.0);
    }

    #[test]
    fn test_single_instanced_ignores_precomputed_mvp() {
        let mut frame = FrameUniforms::default();
        frame.view_projection = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));

        let instance = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let mut draw = DrawUniforms::new(Mat4::identity())
            .with_mvp(Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));
        draw.flags.instanced = true;

        let out = transform_single(&flat_vertex(), &instance, &Mat4::identity(), &frame, &draw);
        // view_projection * instance, а не mvp хоста
        assert_relative_eq!(out.clip_position.x, 3.0);
        assert_relative_eq!(out.clip_position.y, 5.0);
    }
}
