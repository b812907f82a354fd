// ============================================
// Cascade Selection - Выбор каскада CSM
// ============================================
// Дистанции каскадов строго возрастают (проверяется при создании),
// выбор по глубине фрагмента детерминированный: первый подходящий
// каскад, без отката на дальние.

use ultraviolet::{Mat4, Vec3, Vec4};

/// Максимум каскадов в атласе
pub const MAX_CASCADES: usize = 6;

/// Ошибки конструирования набора каскадов
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    /// Пустой набор
    Empty,
    /// Больше MAX_CASCADES
    TooMany(usize),
    /// Число дистанций не совпадает с числом матриц
    CountMismatch { splits: usize, matrices: usize },
    /// Дистанции не строго возрастают
    NotIncreasing,
}

impl std::fmt::Display for CascadeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeError::Empty => write!(f, "cascade set is empty"),
            CascadeError::TooMany(n) => {
                write!(f, "{} cascades exceed the maximum of {}", n, MAX_CASCADES)
            }
            CascadeError::CountMismatch { splits, matrices } => {
                write!(f, "{} split distances vs {} shadow matrices", splits, matrices)
            }
            CascadeError::NotIncreasing => {
                write!(f, "cascade split distances must strictly increase")
            }
        }
    }
}

impl std::error::Error for CascadeError {}

/// Результат выбора каскада для фрагмента
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeHit {
    /// Индекс каскада
    pub index: usize,
    /// Shadow-координата, приведённая из [-1,1] к [0,1]
    pub coord: Vec3,
}

/// Набор каскадов: дистанции и shadow-матрицы
///
/// Хост считает матрицы и дистанции разбиения, здесь они только
/// валидируются и используются для выбора каскада на фрагмент.
#[derive(Clone, Debug)]
pub struct CascadeSet {
    splits: Vec<f32>,
    matrices: Vec<Mat4>,
}

impl CascadeSet {
    pub fn new(splits: Vec<f32>, matrices: Vec<Mat4>) -> Result<Self, CascadeError> {
        if splits.is_empty() {
            return Err(CascadeError::Empty);
        }
        if splits.len() > MAX_CASCADES {
            return Err(CascadeError::TooMany(splits.len()));
        }
        if splits.len() != matrices.len() {
            return Err(CascadeError::CountMismatch {
                splits: splits.len(),
                matrices: matrices.len(),
            });
        }
        if splits.windows(2).any(|w| w[0] >= w[1]) {
            log::warn!("rejected cascade splits {:?}: not strictly increasing", splits);
            return Err(CascadeError::NotIncreasing);
        }
        Ok(Self { splits, matrices })
    }

    pub fn count(&self) -> usize {
        self.splits.len()
    }

    pub fn splits(&self) -> &[f32] {
        &self.splits
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    /// Выбрать каскад по глубине фрагмента в пространстве камеры
    ///
    /// Скан по возрастанию дистанций, берётся первый каскад, чья
    /// дистанция не меньше глубины (фрагмент ровно на границе уходит
    /// в ближний каскад). Если приведённая shadow-координата выбранного
    /// каскада выходит за единичный куб - фрагмент вне зоны теней,
    /// отката на дальний каскад нет.
    pub fn select(&self, view_depth: f32, shadow_positions: &[Vec4]) -> Option<CascadeHit> {
        for (index, &split) in self.splits.iter().enumerate() {
            if view_depth <= split {
                let sp = shadow_positions.get(index)?;
                let coord = remap_shadow_coord(*sp);
                if in_unit_cube(coord) {
                    return Some(CascadeHit { index, coord });
                }
                return None;
            }
        }
        None
    }
}

/// Перспективное деление и приведение [-1,1] -> [0,1]
fn remap_shadow_coord(sp: Vec4) -> Vec3 {
    let ndc = Vec3::new(sp.x / sp.w, sp.y / sp.w, sp.z / sp.w);
    ndc * 0.5 + Vec3::new(0.5, 0.5, 0.5)
}

/// Границы 0.0 и 1.0 включительно; NaN не проходит
fn in_unit_cube(c: Vec3) -> bool {
    (0.0..=1.0).contains(&c.x) && (0.0..=1.0).contains(&c.y) && (0.0..=1.0).contains(&c.z)
}

/// Debug-цвет зоны каскада
///
/// Назначены только каскады 0-3 (красный/оранжевый/зелёный/пурпурный),
/// у 4 и 5 цвета нет.
pub fn cascade_debug_color(index: usize) -> Option<Vec3> {
    match index {
        0 => Some(Vec3::new(1.0, 0.0, 0.0)),
        1 => Some(Vec3::new(1.0, 0.5, 0.0)),
        2 => Some(Vec3::new(0.0, 1.0, 0.0)),
        3 => Some(Vec3::new(1.0, 0.0, 1.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered(xy: f32, depth: f32) -> Vec4 {
        // NDC координата, после приведения попадает в [0,1]
        Vec4::new(xy, xy, depth, 1.0)
    }

    fn test_set(splits: &[f32]) -> CascadeSet {
        let matrices = vec![Mat4::identity(); splits.len()];
        CascadeSet::new(splits.to_vec(), matrices).unwrap()
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert_eq!(
            CascadeSet::new(vec![], vec![]).unwrap_err(),
            CascadeError::Empty
        );
        assert_eq!(
            CascadeSet::new(vec![1.0; 7], vec![Mat4::identity(); 7]).unwrap_err(),
            CascadeError::TooMany(7)
        );
        assert_eq!(
            CascadeSet::new(vec![1.0, 2.0], vec![Mat4::identity()]).unwrap_err(),
            CascadeError::CountMismatch { splits: 2, matrices: 1 }
        );
        assert_eq!(
            CascadeSet::new(vec![2.0, 2.0], vec![Mat4::identity(); 2]).unwrap_err(),
            CascadeError::NotIncreasing
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let set = test_set(&[10.0, 20.0, 40.0]);
        let positions = vec![centered(0.0, 0.0); 3];

        let first = set.select(15.0, &positions).unwrap();
        for _ in 0..100 {
            assert_eq!(set.select(15.0, &positions).unwrap(), first);
        }
        assert_eq!(first.index, 1);
    }

    #[test]
    fn test_depth_at_split_goes_to_nearer_cascade() {
        let set = test_set(&[10.0, 20.0]);
        let positions = vec![centered(0.0, 0.0); 2];

        // Ровно на границе - ближний каскад
        assert_eq!(set.select(10.0, &positions).unwrap().index, 0);
        // Чуть дальше границы - следующий
        assert_eq!(set.select(10.001, &positions).unwrap().index, 1);
        // За последней дистанцией каскада нет
        assert!(set.select(20.001, &positions).is_none());
    }

    #[test]
    fn test_out_of_cube_demotes_without_fallback() {
        let set = test_set(&[10.0, 20.0]);
        // Первый каскад вне куба, второй попал бы - отката быть не должно
        let positions = vec![centered(1.5, 0.0), centered(0.0, 0.0)];
        assert!(set.select(5.0, &positions).is_none());
    }

    #[test]
    fn test_unit_cube_bounds_inclusive() {
        let set = test_set(&[10.0]);

        // Ровно на границах куба: NDC -1 и 1 дают 0.0 и 1.0 - в зоне
        assert!(set.select(5.0, &[Vec4::new(-1.0, 1.0, 1.0, 1.0)]).is_some());
        assert!(set.select(5.0, &[Vec4::new(0.0, 0.0, -1.0, 1.0)]).is_some());

        // Малейший выход за куб - вне зоны
        let eps = 2.0e-4; // 1.0001 после приведения
        assert!(set.select(5.0, &[Vec4::new(1.0 + eps, 0.0, 0.0, 1.0)]).is_none());
        assert!(set.select(5.0, &[Vec4::new(0.0, 0.0, -1.0 - eps, 1.0)]).is_none());
    }

    #[test]
    fn test_debug_colors_assigned_only_for_first_four() {
        for i in 0..4 {
            assert!(cascade_debug_color(i).is_some());
        }
        assert!(cascade_debug_color(4).is_none());
        assert!(cascade_debug_color(5).is_none());
    }
}
