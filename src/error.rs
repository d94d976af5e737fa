use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, ProbeError>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum ProbeError {
    /// The color-map description could not be deserialized.
    #[from]
    Xml(quick_xml::DeError),
    /// The color-map description is not well-formed XML.
    #[from]
    XmlSyntax(quick_xml::Error),
    /// The XML document has neither `<ColorMaps><ColorMap>` nor a `<ColorMap>` root.
    MissingColorMap,
    /// Point and scalar sequences disagree in length.
    MismatchedLengths { points: usize, scalars: usize },
    /// The flat voxel array does not match the grid dimensions.
    #[from]
    GridShape(ndarray::ShapeError),
    /// A frame transform has no inverse.
    SingularTransform,
    /// No color asset is registered under this identifier.
    UnknownColorAsset(String),
}

impl std::error::Error for ProbeError {}
