// Glow-style lighthouse maps: static SVG/PNG and an interactive Leaflet page

use crate::artifact::{self, ArtifactError};
use crate::model::{LighthouseDataset, LighthouseRecord};
use image::{ImageFormat, Rgba, RgbaImage};
use lightmap_scanner::Coordinates;
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Invalid color '{0}': expected #rrggbb")]
    InvalidColor(String),

    #[error("Invalid map size {width}x{height}: each side must be 1 to {MAX_DIMENSION} pixels")]
    InvalidSize { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to serialize markers: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Html,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "svg" => Some(OutputFormat::Svg),
            "png" => Some(OutputFormat::Png),
            "html" | "htm" => Some(OutputFormat::Html),
            _ => None,
        }
    }

    /// Format implied by a file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_str)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Html => "html",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapExtent {
    /// Contiguous United States
    #[default]
    Conus,
    World,
}

impl MapExtent {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "conus" | "lower48" | "us" => Some(MapExtent::Conus),
            "world" | "all" => Some(MapExtent::World),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MapExtent::Conus => "conus",
            MapExtent::World => "world",
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            MapExtent::Conus => Bounds {
                min_lon: -125.0,
                max_lon: -66.5,
                min_lat: 24.0,
                max_lat: 50.0,
            },
            MapExtent::World => Bounds {
                min_lon: -180.0,
                max_lon: 180.0,
                min_lat: -85.0,
                max_lat: 85.0,
            },
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, coordinates: Coordinates) -> bool {
        let b = self.bounds();
        (b.min_lon..=b.max_lon).contains(&coordinates.longitude)
            && (b.min_lat..=b.max_lat).contains(&coordinates.latitude)
    }
}

/// Largest accepted canvas side, in pixels.
pub const MAX_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub background_color: String,
    pub marker_color: String,
    pub glow_color: String,
    pub glow_effect: bool,
    pub marker_radius: f64,
    pub glow_radius: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            background_color: "#030304".to_string(),
            marker_color: "#fafad2".to_string(),
            glow_color: "#73730d".to_string(),
            glow_effect: true,
            marker_radius: 1.5,
            glow_radius: 14.0,
            width: 1400,
            height: 900,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    pub format: OutputFormat,
    pub extent: MapExtent,
    pub style: MapStyle,
}

/// What made it onto the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapSummary {
    pub total: usize,
    pub plotted: usize,
    pub unresolved: usize,
    pub out_of_extent: usize,
}

#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    pub summary: MapSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn parse(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MapError::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| MapError::InvalidColor(s.to_string()))
        };
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

struct Palette {
    background: Rgb,
    marker: Rgb,
    glow: Rgb,
}

impl Palette {
    fn from_style(style: &MapStyle) -> Result<Self> {
        Ok(Self {
            background: Rgb::parse(&style.background_color)?,
            marker: Rgb::parse(&style.marker_color)?,
            glow: Rgb::parse(&style.glow_color)?,
        })
    }
}

/// Projects lon/lat in degrees onto a plane with y pointing north.
enum Projection {
    /// Spherical Albers equal-area conic
    Albers { n: f64, c: f64, rho0: f64, lon0: f64 },
    Equirectangular,
}

impl Projection {
    fn for_extent(extent: MapExtent) -> Self {
        match extent {
            MapExtent::Conus => Self::albers(-96.0, 37.5, 29.5, 45.5),
            MapExtent::World => Projection::Equirectangular,
        }
    }

    fn albers(lon0: f64, lat0: f64, parallel1: f64, parallel2: f64) -> Self {
        let (phi1, phi2, phi0) = (parallel1.to_radians(), parallel2.to_radians(), lat0.to_radians());
        let n = (phi1.sin() + phi2.sin()) / 2.0;
        let c = phi1.cos().powi(2) + 2.0 * n * phi1.sin();
        let rho0 = (c - 2.0 * n * phi0.sin()).sqrt() / n;
        Projection::Albers {
            n,
            c,
            rho0,
            lon0: lon0.to_radians(),
        }
    }

    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        match *self {
            Projection::Albers { n, c, rho0, lon0 } => {
                let rho = (c - 2.0 * n * lat.to_radians().sin()).sqrt() / n;
                let theta = n * (lon.to_radians() - lon0);
                (rho * theta.sin(), rho0 - rho * theta.cos())
            }
            Projection::Equirectangular => (lon.to_radians(), lat.to_radians()),
        }
    }
}

/// Maps projected coordinates into pixel space, fitted to the extent with
/// the aspect ratio preserved.
struct Viewport {
    projection: Projection,
    min_x: f64,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    const EDGE_SAMPLES: usize = 64;
    const PADDING: f64 = 0.03;

    fn fit(extent: MapExtent, width: u32, height: u32) -> Self {
        let projection = Projection::for_extent(extent);
        let b = extent.bounds();

        // Conic projections bow the extent's edges, so sample along all four
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for i in 0..=Self::EDGE_SAMPLES {
            let t = i as f64 / Self::EDGE_SAMPLES as f64;
            let lon = b.min_lon + t * (b.max_lon - b.min_lon);
            let lat = b.min_lat + t * (b.max_lat - b.min_lat);
            for (x, y) in [
                projection.project(lon, b.min_lat),
                projection.project(lon, b.max_lat),
                projection.project(b.min_lon, lat),
                projection.project(b.max_lon, lat),
            ] {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }

        let usable_w = width as f64 * (1.0 - 2.0 * Self::PADDING);
        let usable_h = height as f64 * (1.0 - 2.0 * Self::PADDING);
        let scale = (usable_w / (max_x - min_x)).min(usable_h / (max_y - min_y));
        let offset_x = (width as f64 - (max_x - min_x) * scale) / 2.0;
        let offset_y = (height as f64 - (max_y - min_y) * scale) / 2.0;

        Self {
            projection,
            min_x,
            max_y,
            scale,
            offset_x,
            offset_y,
        }
    }

    fn to_pixel(&self, coordinates: Coordinates) -> (f64, f64) {
        let (x, y) = self
            .projection
            .project(coordinates.longitude, coordinates.latitude);
        (
            self.offset_x + (x - self.min_x) * self.scale,
            self.offset_y + (self.max_y - y) * self.scale,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
struct Marker {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year_built: Option<u16>,
    lat: f64,
    lon: f64,
}

impl Marker {
    fn from_record(record: &LighthouseRecord, coordinates: Coordinates) -> Self {
        Self {
            name: record.name.clone(),
            state: record.state.clone(),
            year_built: record.year_built,
            lat: coordinates.latitude,
            lon: coordinates.longitude,
        }
    }

    fn label(&self) -> String {
        let details: Vec<String> = [
            self.state.clone(),
            self.year_built.map(|year| format!("built {}", year)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if details.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, details.join(", "))
        }
    }

    fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.lat,
            longitude: self.lon,
        }
    }
}

/// Split the dataset into plottable markers and the counts of what was left out.
fn select_markers(dataset: &LighthouseDataset, extent: MapExtent) -> (Vec<Marker>, MapSummary) {
    let mut summary = MapSummary {
        total: dataset.len(),
        ..MapSummary::default()
    };
    let mut markers = Vec::new();

    for record in &dataset.lighthouses {
        match record.coordinates() {
            None => summary.unresolved += 1,
            Some(c) if !extent.contains(c) => {
                debug!("{} at ({}, {}) is outside the map", record.name, c.latitude, c.longitude);
                summary.out_of_extent += 1;
            }
            Some(c) => markers.push(Marker::from_record(record, c)),
        }
    }

    summary.plotted = markers.len();
    (markers, summary)
}

/// Render every resolved record inside the extent.
pub fn render_map(dataset: &LighthouseDataset, options: &MapOptions) -> Result<RenderedMap> {
    let style = &options.style;
    let valid_side = |side: u32| (1..=MAX_DIMENSION).contains(&side);
    if !valid_side(style.width) || !valid_side(style.height) {
        return Err(MapError::InvalidSize {
            width: style.width,
            height: style.height,
        });
    }
    let palette = Palette::from_style(style)?;
    let (markers, summary) = select_markers(dataset, options.extent);

    if markers.is_empty() {
        warn!(
            "No resolved lighthouses inside the {} extent; the map will be empty",
            options.extent.as_str()
        );
    }

    let bytes = match options.format {
        OutputFormat::Svg => render_svg(&markers, options, &palette).into_bytes(),
        OutputFormat::Png => render_png(&markers, options, &palette)?,
        OutputFormat::Html => render_html(&markers, options, &palette)?.into_bytes(),
    };

    info!(
        "Rendered {} of {} lighthouses ({} unresolved, {} outside the map)",
        summary.plotted, summary.total, summary.unresolved, summary.out_of_extent
    );

    Ok(RenderedMap {
        format: options.format,
        bytes,
        summary,
    })
}

/// Atomically replace whatever is at `path` with the rendered map.
pub fn write_map(path: &Path, map: &RenderedMap) -> Result<()> {
    artifact::write_atomic(path, &map.bytes)?;
    Ok(())
}

fn render_svg(markers: &[Marker], options: &MapOptions, palette: &Palette) -> String {
    let style = &options.style;
    let viewport = Viewport::fit(options.extent, style.width, style.height);
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = style.width,
        h = style.height
    ));
    svg.push_str("<title>Lighthouses</title>\n");
    svg.push_str(&format!(
        "<defs>\n<radialGradient id=\"glow\">\n\
         <stop offset=\"0%\" stop-color=\"{g}\" stop-opacity=\"0.6\"/>\n\
         <stop offset=\"35%\" stop-color=\"{g}\" stop-opacity=\"0.18\"/>\n\
         <stop offset=\"100%\" stop-color=\"{g}\" stop-opacity=\"0\"/>\n\
         </radialGradient>\n</defs>\n",
        g = palette.glow.hex()
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
        palette.background.hex()
    ));

    let pixels: Vec<(f64, f64)> = markers
        .iter()
        .map(|m| viewport.to_pixel(m.coordinates()))
        .collect();

    if style.glow_effect && style.glow_radius > 0.0 {
        svg.push_str("<g class=\"glow\">\n");
        for (x, y) in &pixels {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"url(#glow)\"/>\n",
                x, y, style.glow_radius
            ));
        }
        svg.push_str("</g>\n");
    }

    svg.push_str(&format!("<g class=\"markers\" fill=\"{}\">\n", palette.marker.hex()));
    for (marker, (x, y)) in markers.iter().zip(&pixels) {
        svg.push_str(&format!(
            "<circle class=\"marker\" cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\"><title>{}</title></circle>\n",
            x,
            y,
            style.marker_radius,
            escape(marker.label().as_str())
        ));
    }
    svg.push_str("</g>\n</svg>\n");
    svg
}

fn blend(pixel: &mut Rgba<u8>, color: Rgb, alpha: f64) {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |under: u8, over: u8| -> u8 {
        (under as f64 * (1.0 - alpha) + over as f64 * alpha).round() as u8
    };
    pixel.0 = [
        mix(pixel.0[0], color.0),
        mix(pixel.0[1], color.1),
        mix(pixel.0[2], color.2),
        255,
    ];
}

/// Apply `coverage(distance)` around a point, clipped to the image.
fn stamp(image: &mut RgbaImage, (cx, cy): (f64, f64), radius: f64, color: Rgb, coverage: impl Fn(f64) -> f64) {
    let (width, height) = image.dimensions();
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(width.saturating_sub(1));
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(height.saturating_sub(1));

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let alpha = coverage((dx * dx + dy * dy).sqrt());
            if alpha > 0.0 {
                blend(image.get_pixel_mut(x, y), color, alpha);
            }
        }
    }
}

fn render_png(markers: &[Marker], options: &MapOptions, palette: &Palette) -> Result<Vec<u8>> {
    let style = &options.style;
    let viewport = Viewport::fit(options.extent, style.width, style.height);
    let bg = palette.background;
    let mut image = RgbaImage::from_pixel(style.width, style.height, Rgba([bg.0, bg.1, bg.2, 255]));

    let pixels: Vec<(f64, f64)> = markers
        .iter()
        .map(|m| viewport.to_pixel(m.coordinates()))
        .collect();

    // Halos first so every core sits on top
    if style.glow_effect && style.glow_radius > 0.0 {
        let radius = style.glow_radius;
        for &center in &pixels {
            stamp(&mut image, center, radius, palette.glow, |d| {
                if d >= radius {
                    0.0
                } else {
                    0.45 * (1.0 - d / radius).powi(2)
                }
            });
        }
    }

    let core = style.marker_radius.max(0.5);
    for &center in &pixels {
        stamp(&mut image, center, core + 1.0, palette.marker, |d| {
            (core + 0.5 - d).clamp(0.0, 1.0)
        });
    }

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

const LEAFLET_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Lighthouses</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body, #map { height: 100%; margin: 0; background: __BACKGROUND__; }
</style>
</head>
<body>
<div id="map"></div>
<script>
  const lighthouses = __MARKERS__;
  const map = L.map('map', { preferCanvas: true });
  L.tileLayer('https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png', {
    attribution: '&copy; OpenStreetMap contributors &copy; CARTO',
    subdomains: 'abcd',
    maxZoom: 19
  }).addTo(map);
  map.fitBounds(__BOUNDS__);
  for (const lh of lighthouses) {
    if (__GLOW__) {
      L.circleMarker([lh.lat, lh.lon], {
        radius: __GLOW_RADIUS__, stroke: false, fillColor: '__GLOW_COLOR__', fillOpacity: 0.25, interactive: false
      }).addTo(map);
    }
    const details = [lh.state, lh.year_built ? 'built ' + lh.year_built : null].filter(Boolean).join(', ');
    const popup = document.createElement('div');
    const title = document.createElement('strong');
    title.textContent = lh.name;
    popup.appendChild(title);
    if (details) {
      popup.appendChild(document.createElement('br'));
      popup.appendChild(document.createTextNode(details));
    }
    L.circleMarker([lh.lat, lh.lon], {
      radius: __MARKER_RADIUS__, stroke: false, fillColor: '__MARKER_COLOR__', fillOpacity: 1.0
    }).bindPopup(popup).addTo(map);
  }
</script>
</body>
</html>
"#;

fn render_html(markers: &[Marker], options: &MapOptions, palette: &Palette) -> Result<String> {
    let style = &options.style;
    let b = options.extent.bounds();
    // Names land inside a <script> block
    let markers_json = serde_json::to_string(markers)?.replace("</", "<\\/");

    Ok(LEAFLET_TEMPLATE
        .replace("__BACKGROUND__", &palette.background.hex())
        .replace(
            "__BOUNDS__",
            &format!("[[{}, {}], [{}, {}]]", b.min_lat, b.min_lon, b.max_lat, b.max_lon),
        )
        .replace("__GLOW__", if style.glow_effect { "true" } else { "false" })
        .replace("__GLOW_RADIUS__", &format!("{:.1}", (style.glow_radius / 2.0).max(1.0)))
        .replace("__GLOW_COLOR__", &palette.glow.hex())
        .replace("__MARKER_RADIUS__", &format!("{:.1}", (style.marker_radius * 1.5).max(1.0)))
        .replace("__MARKER_COLOR__", &palette.marker.hex())
        .replace("__MARKERS__", &markers_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn record(name: &str, lat: f64, lon: f64) -> LighthouseRecord {
        let mut record = LighthouseRecord::new(name);
        record.state = Some("MA".to_string());
        record.resolve(Coordinates::new(lat, lon).unwrap());
        record
    }

    fn sample_dataset() -> LighthouseDataset {
        let mut failed = LighthouseRecord::new("Unknown Rock Light");
        failed.mark_not_found();
        LighthouseDataset::new(
            None,
            vec![
                record("Boston Light", 42.3275, -70.8908),
                record("Point Loma", 32.6722, -117.2411),
                record("Diamond Head", 21.2556, -157.8103),
                failed,
            ],
        )
    }

    #[test]
    fn test_select_markers_counts() {
        let (markers, summary) = select_markers(&sample_dataset(), MapExtent::Conus);
        assert_eq!(markers.len(), 2);
        assert_eq!(
            summary,
            MapSummary {
                total: 4,
                plotted: 2,
                unresolved: 1,
                out_of_extent: 1
            }
        );

        let (_, summary) = select_markers(&sample_dataset(), MapExtent::World);
        assert_eq!(summary.plotted, 3);
        assert_eq!(summary.out_of_extent, 0);
    }

    #[test]
    fn test_svg_has_one_marker_per_plotted_record() {
        let map = render_map(&sample_dataset(), &MapOptions::default()).unwrap();
        let svg = String::from_utf8(map.bytes).unwrap();

        assert_eq!(svg.matches("class=\"marker\"").count(), 2);
        assert!(svg.contains("<title>Boston Light (MA)</title>"));
        assert!(svg.contains("fill=\"#030304\""));
        assert!(svg.contains("url(#glow)"));
    }

    #[test]
    fn test_svg_without_glow() {
        let mut options = MapOptions::default();
        options.style.glow_effect = false;
        let map = render_map(&sample_dataset(), &options).unwrap();
        let svg = String::from_utf8(map.bytes).unwrap();
        assert!(!svg.contains("url(#glow)"));
    }

    #[test]
    fn test_svg_escapes_names() {
        let dataset = LighthouseDataset::new(None, vec![record("Tom & Jerry <Light>", 42.0, -70.0)]);
        let map = render_map(&dataset, &MapOptions::default()).unwrap();
        let svg = String::from_utf8(map.bytes).unwrap();
        assert!(svg.contains("Tom &amp; Jerry &lt;Light&gt;"));
    }

    #[test]
    fn test_empty_dataset_renders_empty_map() {
        let map = render_map(&LighthouseDataset::default(), &MapOptions::default()).unwrap();
        let svg = String::from_utf8(map.bytes).unwrap();
        assert_eq!(map.summary.plotted, 0);
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("class=\"marker\"").count(), 0);
    }

    #[test]
    fn test_png_is_valid_image() {
        let options = MapOptions {
            format: OutputFormat::Png,
            style: MapStyle {
                width: 200,
                height: 120,
                ..MapStyle::default()
            },
            ..MapOptions::default()
        };
        let map = render_map(&sample_dataset(), &options).unwrap();
        assert_eq!(&map.bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&map.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (200, 120));
        // Corner stays background, something got brighter
        assert_eq!(decoded.get_pixel(0, 0).0, [3, 3, 4, 255]);
        assert!(decoded.pixels().any(|p| p.0[0] > 200));
    }

    #[test]
    fn test_html_embeds_markers_safely() {
        let dataset = LighthouseDataset::new(None, vec![record("</script> Light", 42.0, -70.0)]);
        let options = MapOptions {
            format: OutputFormat::Html,
            ..MapOptions::default()
        };
        let map = render_map(&dataset, &options).unwrap();
        let html = String::from_utf8(map.bytes).unwrap();

        assert!(html.contains("dark_all"));
        assert!(html.contains("<\\/script> Light"));
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(!html.contains("__MARKERS__"));
    }

    #[test]
    fn test_invalid_color_rejected() {
        let mut options = MapOptions::default();
        options.style.glow_color = "yellowish".to_string();
        assert!(matches!(
            render_map(&sample_dataset(), &options),
            Err(MapError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let mut options = MapOptions {
            format: OutputFormat::Png,
            ..MapOptions::default()
        };
        options.style.width = 100_000;
        options.style.height = 100_000;
        assert!(matches!(
            render_map(&sample_dataset(), &options),
            Err(MapError::InvalidSize { width: 100_000, .. })
        ));

        options.style.width = MAX_DIMENSION;
        options.style.height = 0;
        assert!(matches!(
            render_map(&sample_dataset(), &options),
            Err(MapError::InvalidSize { height: 0, .. })
        ));
    }

    #[test]
    fn test_conus_corners_fit_inside_canvas() {
        let viewport = Viewport::fit(MapExtent::Conus, 1400, 900);
        let b = MapExtent::Conus.bounds();
        for (lon, lat) in [
            (b.min_lon, b.min_lat),
            (b.min_lon, b.max_lat),
            (b.max_lon, b.min_lat),
            (b.max_lon, b.max_lat),
            (-96.0, 37.5),
        ] {
            let (x, y) = viewport.to_pixel(Coordinates::new(lat, lon).unwrap());
            assert!((0.0..=1400.0).contains(&x), "x={} for ({}, {})", x, lon, lat);
            assert!((0.0..=900.0).contains(&y), "y={} for ({}, {})", y, lon, lat);
        }

        // North is up, east is right
        let boston = viewport.to_pixel(Coordinates::new(42.33, -70.89).unwrap());
        let san_diego = viewport.to_pixel(Coordinates::new(32.67, -117.24).unwrap());
        assert!(boston.0 > san_diego.0);
        assert!(boston.1 < san_diego.1);
    }

    #[test]
    fn test_albers_origin() {
        let projection = Projection::for_extent(MapExtent::Conus);
        let (x, y) = projection.project(-96.0, 37.5);
        assert!(approx(x, 0.0));
        assert!(approx(y, 0.0));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("maps/out.PNG")), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_path(Path::new("maps/out.html")), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::from_path(Path::new("maps/out")), None);
    }

    #[test]
    fn test_extent_contains_edges() {
        assert!(MapExtent::Conus.contains(Coordinates::new(24.0, -125.0).unwrap()));
        assert!(!MapExtent::Conus.contains(Coordinates::new(23.9, -100.0).unwrap()));
    }
}
