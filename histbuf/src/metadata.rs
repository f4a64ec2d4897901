//! Free-form metadata and presentation hints
//!
//! Most nodes can carry a [`Metadata`] blob for application data and a
//! [`Decoration`] blob for styling. Both are opaque strings tagged with a
//! language; when the language is a JSON dialect the string must parse.

use std::rc::{Rc, Weak};

use histbuf_core::wire::{DecorationRecord, MetadataRecord};
use histbuf_core::{DecorationLanguage, MetadataLanguage};

use crate::attribute::{Claims, Field, FieldDesc};
use crate::error::{structure, Result};
use crate::node::{Link, NodeInner};
use crate::validate::{Shape, Validate};

fn check_json(owner: &str, language: &str, data: &str) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(data)
        .map(|_| ())
        .map_err(|e| structure(format!("{owner}.data is declared {language} but does not parse: {e}")))
}

static METADATA_DATA: FieldDesc = FieldDesc::new("Metadata", "data").required();
static METADATA_LANGUAGE: FieldDesc = FieldDesc::new("Metadata", "language");

pub(crate) struct MetadataInner {
    link: Link,
    data: Field<String>,
    language: Field<MetadataLanguage>,
}

node_handle!(
    /// Application-defined data attached to a node
    Metadata,
    MetadataInner
);

impl Metadata {
    pub fn new(data: impl Into<String>) -> Self {
        Self(Rc::new(MetadataInner {
            link: Link::default(),
            data: Field::new(&METADATA_DATA, data.into()),
            language: Field::new(&METADATA_LANGUAGE, MetadataLanguage::default()),
        }))
    }

    /// Metadata that must be valid JSON
    pub fn json(data: impl Into<String>) -> Self {
        let metadata = Self::new(data);
        metadata.set_language(MetadataLanguage::Json);
        metadata
    }

    pub fn data(&self) -> String {
        self.0.data.get()
    }

    pub fn set_data(&self, data: impl Into<String>) {
        self.0.data.set(data.into());
    }

    pub fn language(&self) -> MetadataLanguage {
        self.0.language.get()
    }

    pub fn set_language(&self, language: MetadataLanguage) {
        self.0.language.set(language);
    }

    pub(crate) fn from_record(record: &Rc<MetadataRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(MetadataInner {
            link: Link::attached(parent),
            data: Field::new(&METADATA_DATA, record.data.clone()),
            language: Field::new(&METADATA_LANGUAGE, record.language),
        }))
    }

    pub(crate) fn to_record(&self) -> MetadataRecord {
        MetadataRecord {
            data: self.data(),
            language: self.language(),
        }
    }
}

impl Validate for Metadata {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        if self.language() == MetadataLanguage::Json {
            self.0
                .data
                .with(|data| check_json("Metadata", "json", data))?;
        }
        Ok(context.to_vec())
    }
}

static DECORATION_DATA: FieldDesc = FieldDesc::new("Decoration", "data").required();
static DECORATION_LANGUAGE: FieldDesc = FieldDesc::new("Decoration", "language");

pub(crate) struct DecorationInner {
    link: Link,
    data: Field<String>,
    language: Field<DecorationLanguage>,
}

node_handle!(
    /// Styling hints for plotting front-ends
    Decoration,
    DecorationInner
);

impl Decoration {
    pub fn new(data: impl Into<String>) -> Self {
        Self(Rc::new(DecorationInner {
            link: Link::default(),
            data: Field::new(&DECORATION_DATA, data.into()),
            language: Field::new(&DECORATION_LANGUAGE, DecorationLanguage::default()),
        }))
    }

    pub fn with_language(self, language: DecorationLanguage) -> Self {
        self.set_language(language);
        self
    }

    pub fn data(&self) -> String {
        self.0.data.get()
    }

    pub fn set_data(&self, data: impl Into<String>) {
        self.0.data.set(data.into());
    }

    pub fn language(&self) -> DecorationLanguage {
        self.0.language.get()
    }

    pub fn set_language(&self, language: DecorationLanguage) {
        self.0.language.set(language);
    }

    pub(crate) fn from_record(record: &Rc<DecorationRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(DecorationInner {
            link: Link::attached(parent),
            data: Field::new(&DECORATION_DATA, record.data.clone()),
            language: Field::new(&DECORATION_LANGUAGE, record.language),
        }))
    }

    pub(crate) fn to_record(&self) -> DecorationRecord {
        DecorationRecord {
            data: self.data(),
            language: self.language(),
        }
    }
}

impl Validate for Decoration {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let language = self.language();
        if matches!(language, DecorationLanguage::Vega | DecorationLanguage::RootJson) {
            self.0
                .data
                .with(|data| check_json("Decoration", language.name(), data))?;
        }
        Ok(context.to_vec())
    }
}

pub(crate) fn metadata_record(metadata: Option<Metadata>) -> Option<Rc<MetadataRecord>> {
    metadata.map(|m| Rc::new(m.to_record()))
}

/// Field descriptors of the presentation fields of one node type
pub(crate) struct AnnotationDescs {
    title: FieldDesc,
    metadata: FieldDesc,
    decoration: FieldDesc,
}

impl AnnotationDescs {
    pub(crate) const fn new(owner: &'static str) -> Self {
        Self {
            title: FieldDesc::new(owner, "title"),
            metadata: FieldDesc::new(owner, "metadata"),
            decoration: FieldDesc::new(owner, "decoration"),
        }
    }
}

/// Title, metadata and decoration, shared by most node types
pub(crate) struct Annotations {
    descs: &'static AnnotationDescs,
    title: Field<String>,
    metadata: Field<Option<Metadata>>,
    decoration: Field<Option<Decoration>>,
}

impl Annotations {
    pub(crate) fn new(descs: &'static AnnotationDescs) -> Self {
        Self {
            descs,
            title: Field::new(&descs.title, String::new()),
            metadata: Field::new(&descs.metadata, None),
            decoration: Field::new(&descs.decoration, None),
        }
    }

    /// Presentation fields of a decoded node whose handle is `parent`
    pub(crate) fn decoded(
        descs: &'static AnnotationDescs,
        title: &str,
        metadata: &Option<Rc<MetadataRecord>>,
        decoration: &Option<Rc<DecorationRecord>>,
        parent: &Weak<dyn NodeInner>,
    ) -> Self {
        Self {
            descs,
            title: Field::new(&descs.title, title.to_string()),
            metadata: Field::lazy(&descs.metadata, &Rc::new(metadata.clone()), parent, |r, me| {
                r.as_ref().map(|m| Metadata::from_record(m, me.clone()))
            }),
            decoration: Field::lazy(&descs.decoration, &Rc::new(decoration.clone()), parent, |r, me| {
                r.as_ref().map(|d| Decoration::from_record(d, me.clone()))
            }),
        }
    }

    pub(crate) fn title(&self) -> String {
        self.title.get()
    }

    pub(crate) fn set_title(&self, title: String) {
        self.title.set(title);
    }

    pub(crate) fn metadata(&self) -> Option<Metadata> {
        self.metadata.get()
    }

    pub(crate) fn set_metadata(&self, metadata: Option<Metadata>, owner: &Weak<dyn NodeInner>) -> Result<()> {
        Claims::new()
            .opt(&self.descs.metadata, &metadata)
            .commit(owner)?;
        self.metadata.set(metadata);
        Ok(())
    }

    pub(crate) fn decoration(&self) -> Option<Decoration> {
        self.decoration.get()
    }

    pub(crate) fn set_decoration(
        &self,
        decoration: Option<Decoration>,
        owner: &Weak<dyn NodeInner>,
    ) -> Result<()> {
        Claims::new()
            .opt(&self.descs.decoration, &decoration)
            .commit(owner)?;
        self.decoration.set(decoration);
        Ok(())
    }

    pub(crate) fn validate(&self, context: &[usize]) -> Result<()> {
        self.metadata().validate(context)?;
        self.decoration().validate(context)?;
        Ok(())
    }

    pub(crate) fn metadata_record(&self) -> Option<Rc<MetadataRecord>> {
        metadata_record(self.metadata())
    }

    pub(crate) fn decoration_record(&self) -> Option<Rc<DecorationRecord>> {
        self.decoration().map(|d| Rc::new(d.to_record()))
    }
}

/// Public title/metadata/decoration accessors for a handle whose inner
/// struct has an `annotations` field
macro_rules! annotated {
    ($name:ident) => {
        impl $name {
            pub fn title(&self) -> String {
                self.0.annotations.title()
            }

            pub fn set_title(&self, title: impl Into<String>) {
                self.0.annotations.set_title(title.into());
            }

            pub fn with_title(self, title: impl Into<String>) -> Self {
                self.set_title(title);
                self
            }

            pub fn metadata(&self) -> Option<$crate::metadata::Metadata> {
                self.0.annotations.metadata()
            }

            pub fn set_metadata(
                &self,
                metadata: Option<$crate::metadata::Metadata>,
            ) -> $crate::error::Result<()> {
                self.0.annotations.set_metadata(metadata, &self.weak())
            }

            pub fn with_metadata(
                self,
                metadata: $crate::metadata::Metadata,
            ) -> $crate::error::Result<Self> {
                self.set_metadata(Some(metadata))?;
                Ok(self)
            }

            pub fn decoration(&self) -> Option<$crate::metadata::Decoration> {
                self.0.annotations.decoration()
            }

            pub fn set_decoration(
                &self,
                decoration: Option<$crate::metadata::Decoration>,
            ) -> $crate::error::Result<()> {
                self.0.annotations.set_decoration(decoration, &self.weak())
            }

            pub fn with_decoration(
                self,
                decoration: $crate::metadata::Decoration,
            ) -> $crate::error::Result<Self> {
                self.set_decoration(Some(decoration))?;
                Ok(self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_metadata_must_parse() {
        assert!(Metadata::json(r#"{"run": 42}"#).validate(&[]).is_ok());
        let err = Metadata::json("{run: 42").validate(&[]).unwrap_err();
        assert!(err.is_structural());

        // unspecified language is opaque
        assert!(Metadata::new("{run: 42").validate(&[]).is_ok());
    }

    #[test]
    fn test_decoration_languages() {
        let css = Decoration::new("color: red").with_language(DecorationLanguage::Css);
        assert!(css.validate(&[]).is_ok());

        let vega = Decoration::new("color: red").with_language(DecorationLanguage::Vega);
        assert!(vega.validate(&[]).is_err());
        vega.set_data(r#"{"mark": "bar"}"#);
        assert!(vega.validate(&[]).is_ok());
    }
}
