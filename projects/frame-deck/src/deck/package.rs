// In-memory presentation document and its .pptx (OOXML zip) serializer

use crate::deck::parts::{self, escape_xml};
use crate::error::{DeckError, DeckResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const EMU_PER_INCH: i64 = 914_400;

/// 4:3 slide, 10in x 7.5in.
pub const SLIDE_WIDTH: Emu = Emu(9_144_000);
pub const SLIDE_HEIGHT: Emu = Emu(6_858_000);

/// Length in English Metric Units, the OOXML drawing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emu(pub i64);

impl Emu {
    pub fn inches(value: f64) -> Self {
        Emu((value * EMU_PER_INCH as f64).round() as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideLayout {
    /// Title placeholder only; the body is free for pictures.
    TitleOnly,
}

#[derive(Debug, Clone)]
pub struct Picture {
    pub left: Emu,
    pub top: Emu,
    pub width: Emu,
    pub height: Emu,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Slide {
    pub layout: SlideLayout,
    title: Option<String>,
    pictures: Vec<Picture>,
}

impl Slide {
    fn new(layout: SlideLayout) -> Self {
        Self {
            layout,
            title: None,
            pictures: Vec::new(),
        }
    }

    pub fn set_title(&mut self, text: impl Into<String>) {
        self.title = Some(text.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Embeds the JPEG at `path`, scaled to `height` with its aspect ratio kept.
    ///
    /// The file is fully read into the document before this returns, so the
    /// caller may delete it right away.
    pub fn add_picture(
        &mut self,
        path: &Path,
        left: Emu,
        top: Emu,
        height: Emu,
    ) -> DeckResult<&Picture> {
        let (px_width, px_height) = image::image_dimensions(path).map_err(|e| {
            DeckError::Internal(format!("Unreadable image {}: {}", path.display(), e))
        })?;
        if px_height == 0 {
            return Err(DeckError::Internal(format!(
                "Image {} has zero height",
                path.display()
            )));
        }
        let data = fs::read(path)?;

        let width = Emu((height.0 as f64 * px_width as f64 / px_height as f64).round() as i64);
        self.pictures.push(Picture {
            left,
            top,
            width,
            height,
            data,
        });
        Ok(&self.pictures[self.pictures.len() - 1])
    }
}

#[derive(Debug, Clone, Default)]
pub struct Presentation {
    slides: Vec<Slide>,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_slide(&mut self, layout: SlideLayout) -> &mut Slide {
        self.slides.push(Slide::new(layout));
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Writes the document as a .pptx package at `path`, replacing any
    /// existing file.
    pub fn save(&self, path: &Path) -> DeckResult<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let mut put = |name: &str, body: &[u8], compress: bool| -> DeckResult<()> {
            let method = if compress {
                CompressionMethod::Deflated
            } else {
                CompressionMethod::Stored
            };
            zip.start_file(name, SimpleFileOptions::default().compression_method(method))?;
            zip.write_all(body)?;
            Ok(())
        };

        put("[Content_Types].xml", self.content_types().as_bytes(), true)?;
        put("_rels/.rels", root_rels().as_bytes(), true)?;
        put("docProps/core.xml", core_props().as_bytes(), true)?;
        put("docProps/app.xml", self.app_props().as_bytes(), true)?;
        put("ppt/presentation.xml", self.presentation_xml().as_bytes(), true)?;
        put(
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels().as_bytes(),
            true,
        )?;
        put(
            "ppt/slideMasters/slideMaster1.xml",
            parts::slide_master().as_bytes(),
            true,
        )?;
        put(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            parts::slide_master_rels().as_bytes(),
            true,
        )?;
        put(
            "ppt/slideLayouts/slideLayout1.xml",
            parts::title_only_layout().as_bytes(),
            true,
        )?;
        put(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            parts::title_only_layout_rels().as_bytes(),
            true,
        )?;
        put("ppt/theme/theme1.xml", parts::theme().as_bytes(), true)?;

        let mut image_number = 0;
        for (i, slide) in self.slides.iter().enumerate() {
            let slide_number = i + 1;
            let first_image = image_number + 1;
            for picture in &slide.pictures {
                image_number += 1;
                put(
                    &format!("ppt/media/image{}.jpeg", image_number),
                    &picture.data,
                    // JPEG data is already compressed
                    false,
                )?;
            }
            put(
                &format!("ppt/slides/slide{}.xml", slide_number),
                slide_xml(slide).as_bytes(),
                true,
            )?;
            put(
                &format!("ppt/slides/_rels/slide{}.xml.rels", slide_number),
                slide_rels(slide, first_image).as_bytes(),
                true,
            )?;
        }

        zip.finish()?;
        Ok(())
    }

    fn content_types(&self) -> String {
        let mut xml = format!(
            r#"{}
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="jpeg" ContentType="image/jpeg"/>"#,
            parts::XML_DECL,
            parts::CT_RELS
        );
        let overrides = [
            ("/ppt/presentation.xml", parts::CT_PRESENTATION),
            ("/ppt/slideMasters/slideMaster1.xml", parts::CT_SLIDE_MASTER),
            ("/ppt/slideLayouts/slideLayout1.xml", parts::CT_SLIDE_LAYOUT),
            ("/ppt/theme/theme1.xml", parts::CT_THEME),
            ("/docProps/core.xml", parts::CT_CORE_PROPS),
            ("/docProps/app.xml", parts::CT_APP_PROPS),
        ];
        for (part, content_type) in overrides {
            xml.push_str(&override_entry(part, content_type));
        }
        for i in 1..=self.slides.len() {
            xml.push_str(&override_entry(
                &format!("/ppt/slides/slide{}.xml", i),
                parts::CT_SLIDE,
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation_xml(&self) -> String {
        let slide_ids: String = (0..self.slides.len())
            .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 3))
            .collect();
        let slide_list = if slide_ids.is_empty() {
            String::new()
        } else {
            format!("<p:sldIdLst>{}</p:sldIdLst>", slide_ids)
        };

        format!(
            r#"{decl}
<p:presentation xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{slide_list}<p:sldSz cx="{cx}" cy="{cy}" type="screen4x3"/><p:notesSz cx="{cy}" cy="{cx}"/><p:defaultTextStyle><a:defPPr><a:defRPr lang="en-US"/></a:defPPr></p:defaultTextStyle></p:presentation>"#,
            decl = parts::XML_DECL,
            a = parts::NS_A,
            r = parts::NS_R,
            p = parts::NS_P,
            cx = SLIDE_WIDTH.0,
            cy = SLIDE_HEIGHT.0,
        )
    }

    fn presentation_rels(&self) -> String {
        let slide_targets: Vec<(String, String)> = (0..self.slides.len())
            .map(|i| (format!("rId{}", i + 3), format!("slides/slide{}.xml", i + 1)))
            .collect();

        let mut rels = vec![
            ("rId1", parts::REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
            ("rId2", parts::REL_THEME, "theme/theme1.xml"),
        ];
        for (id, target) in &slide_targets {
            rels.push((id.as_str(), parts::REL_SLIDE, target.as_str()));
        }
        parts::relationships(&rels)
    }

    fn app_props(&self) -> String {
        format!(
            r#"{}
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>frame-deck</Application><Slides>{}</Slides></Properties>"#,
            parts::XML_DECL,
            self.slides.len()
        )
    }
}

fn override_entry(part: &str, content_type: &str) -> String {
    format!(
        r#"<Override PartName="{}" ContentType="{}"/>"#,
        part, content_type
    )
}

fn root_rels() -> String {
    parts::relationships(&[
        ("rId1", parts::REL_OFFICE_DOCUMENT, "ppt/presentation.xml"),
        ("rId2", parts::REL_CORE_PROPS, "docProps/core.xml"),
        ("rId3", parts::REL_APP_PROPS, "docProps/app.xml"),
    ])
}

fn core_props() -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        r#"{}
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Video frames</dc:title><dc:creator>frame-deck</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified></cp:coreProperties>"#,
        parts::XML_DECL,
    )
}

fn slide_xml(slide: &Slide) -> String {
    // Shape id 1 is the group root, 2 the title
    let mut shapes = String::new();
    if let Some(title) = slide.title() {
        shapes.push_str(&format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
            escape_xml(title)
        ));
    }
    for (k, picture) in slide.pictures.iter().enumerate() {
        let shape_id = k + 3;
        shapes.push_str(&format!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {n}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
            id = shape_id,
            n = shape_id - 1,
            rel = k + 2,
            x = picture.left.0,
            y = picture.top.0,
            cx = picture.width.0,
            cy = picture.height.0,
        ));
    }

    format!(
        r#"{decl}
<p:sld xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        decl = parts::XML_DECL,
        a = parts::NS_A,
        r = parts::NS_R,
        p = parts::NS_P,
    )
}

fn slide_rels(slide: &Slide, first_image: usize) -> String {
    let image_targets: Vec<(String, String)> = (0..slide.pictures.len())
        .map(|k| {
            (
                format!("rId{}", k + 2),
                format!("../media/image{}.jpeg", first_image + k),
            )
        })
        .collect();

    let layout_target = match slide.layout {
        SlideLayout::TitleOnly => "../slideLayouts/slideLayout1.xml",
    };
    let mut rels = vec![("rId1", parts::REL_SLIDE_LAYOUT, layout_target)];
    for (id, target) in &image_targets {
        rels.push((id.as_str(), parts::REL_IMAGE, target.as_str()));
    }
    parts::relationships(&rels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::test_support::{scratch_dir, solid_frame};
    use opencv::core::Vector;
    use opencv::imgcodecs;
    use std::io::Read;

    fn write_jpeg(path: &Path, rows: i32, cols: i32) {
        let frame = solid_frame(rows, cols, 128.0);
        imgcodecs::imwrite(path.to_str().unwrap(), &frame, &Vector::new()).unwrap();
    }

    fn read_part(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut content = String::new();
        part.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_inches_to_emu() {
        assert_eq!(Emu::inches(1.0), Emu(914_400));
        assert_eq!(Emu::inches(5.5), Emu(5_029_200));
    }

    #[test]
    fn test_add_picture_keeps_aspect_ratio() {
        let tmp_dir = scratch_dir("package-aspect");
        let dir = tmp_dir.path();
        let image_path = dir.join("wide.jpg");
        write_jpeg(&image_path, 480, 640);

        let mut deck = Presentation::new();
        let slide = deck.add_slide(SlideLayout::TitleOnly);
        let picture = slide
            .add_picture(&image_path, Emu::inches(1.0), Emu::inches(1.0), Emu::inches(5.5))
            .unwrap();
        assert_eq!(picture.left, Emu(914_400));
        assert_eq!(picture.height, Emu(5_029_200));
        assert_eq!(picture.width, Emu(6_705_600));
    }

    #[test]
    fn test_picture_survives_source_deletion() {
        let tmp_dir = scratch_dir("package-embed");
        let dir = tmp_dir.path();
        let image_path = dir.join("frame.jpg");
        write_jpeg(&image_path, 120, 160);
        let original = fs::read(&image_path).unwrap();

        let mut deck = Presentation::new();
        deck.add_slide(SlideLayout::TitleOnly)
            .add_picture(&image_path, Emu(0), Emu(0), Emu::inches(1.0))
            .unwrap();
        fs::remove_file(&image_path).unwrap();

        let out = dir.join("deck.pptx");
        deck.save(&out).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let mut media = archive.by_name("ppt/media/image1.jpeg").unwrap();
        let mut embedded = Vec::new();
        media.read_to_end(&mut embedded).unwrap();
        assert_eq!(embedded, original);
    }

    #[test]
    fn test_save_writes_package_parts() {
        let tmp_dir = scratch_dir("package-parts");
        let dir = tmp_dir.path();
        let mut deck = Presentation::new();
        deck.add_slide(SlideLayout::TitleOnly).set_title("Slide 1");
        deck.add_slide(SlideLayout::TitleOnly).set_title("Q&A <live>");

        let out = dir.join("deck.pptx");
        deck.save(&out).unwrap();

        let archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for expected in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }

        let presentation = read_part(&out, "ppt/presentation.xml");
        assert!(presentation.contains(r#"<p:sldId id="256" r:id="rId3"/>"#));
        assert!(presentation.contains(r#"<p:sldId id="257" r:id="rId4"/>"#));

        let content_types = read_part(&out, "[Content_Types].xml");
        assert!(content_types.contains("/ppt/slides/slide2.xml"));

        let second = read_part(&out, "ppt/slides/slide2.xml");
        assert!(second.contains("<a:t>Q&amp;A &lt;live&gt;</a:t>"));
    }

    #[test]
    fn test_save_empty_presentation() {
        let tmp_dir = scratch_dir("package-empty");
        let dir = tmp_dir.path();
        let out = dir.join("empty.pptx");
        Presentation::new().save(&out).unwrap();

        let presentation = read_part(&out, "ppt/presentation.xml");
        assert!(!presentation.contains("sldIdLst"));
        assert!(fs::metadata(&out).unwrap().len() > 0);
    }
}
