use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Bounding box and enclosed area of one external contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Polygon area of the contour itself, not of the box.
    pub area: f64,
}

impl Region {
    fn from_points(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
            area: polygon_area(points),
        })
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn box_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Smallest region covering both boxes. Area is summed.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Region {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
            area: self.area + other.area,
        }
    }
}

/// Outermost contours of the non-zero pixels of `mask`, in scan order.
pub fn external_regions(mask: &GrayImage) -> Vec<Region> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| Region::from_points(&c.points))
        .collect()
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice as f64 / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_single_rectangle() {
        let mut mask = GrayImage::new(100, 80);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 20).of_size(30, 15), Luma([255u8]));

        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 1);
        let r = regions[0];
        assert_eq!((r.x, r.y, r.width, r.height), (10, 20, 30, 15));
        // Boundary polygon runs through pixel centres.
        assert_eq!(r.area, 29.0 * 14.0);
    }

    #[test]
    fn test_holes_are_not_external() {
        let mut mask = GrayImage::new(60, 60);
        draw_filled_rect_mut(&mut mask, Rect::at(5, 5).of_size(50, 50), Luma([255u8]));
        draw_filled_rect_mut(&mut mask, Rect::at(20, 20).of_size(20, 20), Luma([0u8]));
        draw_filled_rect_mut(&mut mask, Rect::at(27, 27).of_size(6, 6), Luma([255u8]));

        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].width, 50);
    }

    #[test]
    fn test_empty_mask_has_no_regions() {
        assert!(external_regions(&GrayImage::new(10, 10)).is_empty());
    }

    #[test]
    fn test_union() {
        let a = Region { x: 10, y: 10, width: 10, height: 10, area: 81.0 };
        let b = Region { x: 40, y: 5, width: 5, height: 50, area: 196.0 };
        let u = a.union(&b);
        assert_eq!((u.x, u.y, u.right(), u.bottom()), (10, 5, 45, 55));
        assert_eq!(u.area, 277.0);
    }
}
