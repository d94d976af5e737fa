//! Reader for ParaView's color map XML, the format published on sciviscolor.org.
//!
//! ```xml
//! <ColorMaps>
//!   <ColorMap name="blue-orange" space="Lab">
//!     <Point x="0.0" o="1" r="0.09" g="0.11" b="0.35"/>
//!     <Point x="1.0" o="1" r="0.85" g="0.42" b="0.05"/>
//!   </ColorMap>
//! </ColorMaps>
//! ```
//!
//! A bare `<ColorMap>` root is accepted as well. Only the first color map of a
//! `<ColorMaps>` document is read.

use bevy::color::Srgba;
use quick_xml::{Reader, de::from_str, events::Event};
use serde::Deserialize;

use crate::{
    colormap::ControlPoint,
    error::{ProbeError, Result},
    types::Value,
};

/// Parses every `<Point>` of the first color map in `input`.
///
/// Points are returned in document order; sorting and de-duplication are left
/// to [`ColorMap`](crate::colormap::ColorMap).
pub fn parse_control_points(input: &str) -> Result<Vec<ControlPoint>> {
    let root = root_element_name(input)?;
    log::debug!("Parsing ParaView color map with <{root}> root");

    let map = match root.as_str() {
        "ColorMaps" => {
            let doc: ColorMapsDocument = from_str(input)?;
            doc.maps.into_iter().next().ok_or(ProbeError::MissingColorMap)?
        }
        "ColorMap" => from_str::<ColorMapElement>(input)?,
        _ => return Err(ProbeError::MissingColorMap),
    };

    log::debug!(
        "Found {} control points in color map {:?}",
        map.points.len(),
        map.name
    );
    Ok(map
        .points
        .into_iter()
        .map(|p| ControlPoint::new(p.x, Srgba::new(p.r, p.g, p.b, 1.0)))
        .collect())
}

fn root_element_name(input: &str) -> Result<String> {
    let mut reader = Reader::from_str(input);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Event::Eof => return Err(ProbeError::MissingColorMap),
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct ColorMapsDocument {
    #[serde(default, rename = "ColorMap")]
    maps: Vec<ColorMapElement>,
}

#[derive(Debug, Deserialize)]
struct ColorMapElement {
    #[serde(default, rename = "@name")]
    name: Option<String>,
    #[serde(default, rename = "Point")]
    points: Vec<PointElement>,
}

#[derive(Debug, Deserialize)]
struct PointElement {
    #[serde(rename = "@x")]
    x: Value,
    #[serde(rename = "@r")]
    r: Value,
    #[serde(rename = "@g")]
    g: Value,
    #[serde(rename = "@b")]
    b: Value,
}
