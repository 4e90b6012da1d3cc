//! Spherical Web Mercator (EPSG:3857) forward and inverse transforms.

use std::f64::consts::PI;

/// Sphere radius used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude beyond which the projection diverges; inputs are clamped here.
pub const MAX_LAT_DEG: f64 = 85.051_128_779_806_59;

/// Project geographic degrees to Web Mercator meters.
pub fn forward(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MAX_LAT_DEG, MAX_LAT_DEG);
    let x = EARTH_RADIUS_M * lon_deg.to_radians();
    let y = EARTH_RADIUS_M * ((PI / 4.0 + lat.to_radians() / 2.0).tan()).ln();
    (x, y)
}

/// Invert Web Mercator meters back to geographic degrees.
pub fn inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}
