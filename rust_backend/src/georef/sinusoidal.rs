//! Sinusoidal (MODIS land grid) projection.
//!
//! Tiles are 10° x 10° at the equator, numbered `h` eastwards from -180° and `v`
//! southwards from +90°, so tile h18v09 has its top-left corner at the origin.

use crate::core::ModisTile;

/// Authalic sphere radius used by the MODIS land products (metres).
pub const EARTH_RADIUS_M: f64 = 6_371_007.181;
/// Edge length of one tile in projected metres.
pub const TILE_SIZE_M: f64 = 1_111_950.519_766_5;

const H_ORIGIN: f64 = 18.0;
const V_ORIGIN: f64 = 9.0;

/// Projected (x, y) of the centre of pixel (`row`, `col`) in a tile of `rows` x `cols`.
pub fn pixel_center(tile: ModisTile, rows: usize, cols: usize, row: usize, col: usize) -> (f64, f64) {
    let left = (tile.h as f64 - H_ORIGIN) * TILE_SIZE_M;
    let top = (V_ORIGIN - tile.v as f64) * TILE_SIZE_M;
    let x = left + (col as f64 + 0.5) * (TILE_SIZE_M / cols as f64);
    let y = top - (row as f64 + 0.5) * (TILE_SIZE_M / rows as f64);
    (x, y)
}

/// Closed-form inverse: projected metres to (lat, lon) in degrees.
///
/// Returns `None` for points outside the projection's valid domain (the unused
/// corners of edge tiles, or the poles where longitude is undefined).
pub fn to_geographic(x: f64, y: f64) -> Option<(f64, f64)> {
    let lat = y / EARTH_RADIUS_M;
    if !lat.is_finite() || lat.abs() > std::f64::consts::FRAC_PI_2 {
        return None;
    }
    let cos_lat = lat.cos();
    if cos_lat < 1e-12 {
        return None;
    }
    let lon = x / (EARTH_RADIUS_M * cos_lat);
    if lon.abs() > std::f64::consts::PI {
        return None;
    }
    Some((lat.to_degrees(), lon.to_degrees()))
}

/// Geographic location of pixel (`row`, `col`).
pub fn pixel_location(
    tile: ModisTile,
    rows: usize,
    cols: usize,
    row: usize,
    col: usize,
) -> Option<(f64, f64)> {
    let (x, y) = pixel_center(tile, rows, cols, row, col);
    to_geographic(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Forward projection: (lat, lon) in degrees to projected metres.
    fn to_projected(lat: f64, lon: f64) -> (f64, f64) {
        let lat_r = lat.to_radians();
        (
            EARTH_RADIUS_M * lon.to_radians() * lat_r.cos(),
            EARTH_RADIUS_M * lat_r,
        )
    }

    /// Tile containing (lat, lon).
    fn tile_for(lat: f64, lon: f64) -> ModisTile {
        let (x, y) = to_projected(lat, lon);
        let h = (x / TILE_SIZE_M + H_ORIGIN).floor().clamp(0.0, 35.0);
        let v = (V_ORIGIN - y / TILE_SIZE_M).floor().clamp(0.0, 17.0);
        ModisTile::new(h as u8, v as u8)
    }

    /// Pixel (`row`, `col`) of `tile` containing (lat, lon), if it lies in the tile.
    fn pixel_for(
        tile: ModisTile,
        rows: usize,
        cols: usize,
        lat: f64,
        lon: f64,
    ) -> Option<(usize, usize)> {
        let (x, y) = to_projected(lat, lon);
        let left = (tile.h as f64 - H_ORIGIN) * TILE_SIZE_M;
        let top = (V_ORIGIN - tile.v as f64) * TILE_SIZE_M;
        let col = ((x - left) / (TILE_SIZE_M / cols as f64)).floor();
        let row = ((top - y) / (TILE_SIZE_M / rows as f64)).floor();
        if col < 0.0 || row < 0.0 || col >= cols as f64 || row >= rows as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_mumbai_is_in_h24v07() {
        assert_eq!(tile_for(19.076, 72.8777), ModisTile::new(24, 7));
    }

    #[test]
    fn test_round_trip_city_point() {
        let (x, y) = to_projected(19.076, 72.8777);
        let (lat, lon) = to_geographic(x, y).unwrap();
        assert_close(lat, 19.076, 1e-9);
        assert_close(lon, 72.8777, 1e-9);
    }

    #[test]
    fn test_tile_origin_pixel() {
        // h18v09 starts at (0, 0): the first pixel centre sits just south-east of it.
        let (lat, lon) = pixel_location(ModisTile::new(18, 9), 1200, 1200, 0, 0).unwrap();
        assert!(lat < 0.0 && lat > -0.01);
        assert!(lon > 0.0 && lon < 0.01);
    }

    #[test]
    fn test_pixel_lookup_matches_location() {
        let tile = ModisTile::new(24, 7);
        let (row, col) = pixel_for(tile, 1200, 1200, 19.0, 72.8).unwrap();
        let (lat, lon) = pixel_location(tile, 1200, 1200, row, col).unwrap();
        // 1 km pixels: the centre is within ~0.01 degrees of the query point
        assert_close(lat, 19.0, 0.01);
        assert_close(lon, 72.8, 0.01);
    }

    #[test]
    fn test_outside_domain_is_none() {
        // Far corner of an edge tile lies beyond 180 degrees of longitude at high latitude.
        let (x, y) = pixel_center(ModisTile::new(35, 0), 10, 10, 0, 9);
        assert!(to_geographic(x, y).is_none());
    }
}
