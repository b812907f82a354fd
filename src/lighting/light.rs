// ============================================
// Light Source - Направленный свет (солнце)
// ============================================

use ultraviolet::{Mat4, Vec3};

/// Направленный свет (солнце)
#[derive(Clone, Copy, Debug)]
pub struct SunLight {
    /// Направление на источник (нормализованное, от поверхности к солнцу)
    pub direction: Vec3,
    /// Цвет света
    pub color: Vec3,
    /// Сила фонового освещения
    pub ambient: f32,
}

impl SunLight {
    pub fn new(direction: Vec3, color: Vec3, ambient: f32) -> Self {
        Self {
            direction: direction.normalized(),
            color,
            ambient,
        }
    }

    /// Матрица вида из позиции солнца на центр сцены
    ///
    /// Хост использует её при построении shadow-матриц; сама генерация
    /// shadow map остаётся за хостом.
    pub fn view_matrix(&self, center: Vec3) -> Mat4 {
        let up = if self.direction.y.abs() > 0.99 {
            Vec3::new(0.0, 0.0, 1.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };

        Mat4::look_at(center + self.direction * 100.0, center, up)
    }
}

impl Default for SunLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.4, 0.8, 0.3).normalized(),
            color: Vec3::new(1.0, 0.98, 0.9),
            ambient: 0.1,
        }
    }
}
