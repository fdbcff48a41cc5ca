use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Boundary of one foreground region
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
    pub area: f64,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }

    /// Contour with a known area and no geometry
    pub fn with_area(area: f64) -> Self {
        Self {
            points: Vec::new(),
            area,
        }
    }
}

/// Finds regions in a binary mask
pub trait ContourExtractor: Send {
    fn extract(&self, mask: &GrayImage) -> Vec<Contour>;
}

/// Outermost borders only; holes and regions nested inside holes are ignored
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalContourExtractor;

impl ContourExtractor for ExternalContourExtractor {
    fn extract(&self, mask: &GrayImage) -> Vec<Contour> {
        find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .map(|c| Contour::new(c.points))
            .collect()
    }
}

/// Shoelace area of a closed polygon through the given boundary points
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();

    twice_area.abs() as f64 / 2.0
}
