use crate::types::{columns, BoundingBox, PixelTable, WqResult};

/// Touch test between an image footprint and the region of interest
pub trait FootprintTest: Send + Sync {
    fn touches(&self, footprint: &BoundingBox) -> bool;
}

impl FootprintTest for BoundingBox {
    fn touches(&self, footprint: &BoundingBox) -> bool {
        self.intersects(footprint)
    }
}

/// A region made of several boxes touches a footprint if any part does
impl FootprintTest for Vec<BoundingBox> {
    fn touches(&self, footprint: &BoundingBox) -> bool {
        self.iter().any(|b| b.intersects(footprint))
    }
}

/// Extent of the pixel coordinates, None for a table without located pixels
pub fn footprint_of(table: &PixelTable) -> WqResult<Option<BoundingBox>> {
    let lon = table.column(columns::LONGITUDE)?;
    let lat = table.column(columns::LATITUDE)?;
    let mut bbox: Option<BoundingBox> = None;
    for (&x, &y) in lon.iter().zip(lat.iter()) {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        bbox = Some(match bbox {
            None => BoundingBox { min_lon: x, max_lon: x, min_lat: y, max_lat: y },
            Some(b) => BoundingBox {
                min_lon: b.min_lon.min(x),
                max_lon: b.max_lon.max(x),
                min_lat: b.min_lat.min(y),
                max_lat: b.max_lat.max(y),
            },
        });
    }
    Ok(bbox)
}
