//! Annotated shader-source parsing.
//!
//! A shader file is a JSON document whose stage `code` strings are WGSL with a
//! few extra annotations:
//!
//! ```text
//! @tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;
//! @location(0) @attribute=POSITION pos: vec3<f32>,
//! ```
//!
//! `@tag(..)` names the role of a bound resource, `@attribute=..` maps a glTF
//! vertex attribute onto an input location. Both are harvested line by line and
//! then removed, along with `//` comments, before the remaining text is read as
//! JSON. Nothing here touches the GPU.

use std::collections::HashMap;

use serde::Deserialize;

use super::{BindingKind, ShaderError};

const ATTRIBUTE_MARKER: &str = "@attribute=";
const TAG_MARKER: &str = "@tag(";

/// Entry point and code of one shader stage.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StageSource {
    pub entry: String,
    pub code: String,
}

fn default_name() -> String {
    "shader".to_string()
}

#[derive(Debug, Deserialize)]
struct ShaderDocument {
    #[serde(default = "default_name")]
    name: String,
    vertex: Option<StageSource>,
    fragment: Option<StageSource>,
    #[serde(default)]
    bind_groups: HashMap<String, u32>,
    #[serde(default)]
    requires: Vec<String>,
}

/// A resource declaration harvested from a `@group` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub group: u32,
    pub binding: u32,
    /// `var<uniform>`, `var`, ...
    pub qualifier: String,
    pub name: String,
    pub datatype: String,
    pub tag: Option<String>,
}

/// A vertex input harvested from an `@attribute=` line.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSlot {
    /// glTF semantic, e.g. `POSITION` or `TEXCOORD_0`.
    pub semantic: String,
    pub location: u32,
    pub datatype: String,
    pub format: wgpu::VertexFormat,
    pub stride: wgpu::BufferAddress,
}

/// One entry of a bind group. Its position in [`NativeGroup::entries`] is its
/// binding slot.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupEntry {
    pub name: String,
    pub qualifier: String,
    pub datatype: String,
    pub tag: Option<String>,
    pub kind: BindingKind,
    pub visibility: wgpu::ShaderStages,
}

/// A bind group as declared in source, not yet turned into GPU objects.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeGroup {
    pub label: String,
    pub index: u32,
    pub entries: Vec<GroupEntry>,
}

impl NativeGroup {
    pub fn entry(&self, name: &str) -> Option<&GroupEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// An entry returned by [`ShaderSource::query`], with where it lives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueriedEntry<'a> {
    pub group: u32,
    pub slot: u32,
    pub entry: &'a GroupEntry,
}

/// Everything extracted from a shader file.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderSource {
    pub name: String,
    pub vertex: StageSource,
    pub fragment: StageSource,
    /// Logical group names (`OBJECT_INDEX`, ...) to declared group indices.
    pub group_names: HashMap<String, u32>,
    pub requires: Vec<String>,
    /// Sorted by location.
    pub attributes: Vec<AttributeSlot>,
    /// In order of first appearance in the source.
    pub groups: Vec<NativeGroup>,
}

impl ShaderSource {
    pub fn parse(text: &str) -> Result<Self, ShaderError> {
        let raw = strip_comments(text);

        let declarations: Vec<Declaration> = raw
            .lines()
            .filter(|line| line.contains("@group"))
            .filter_map(|line| {
                let declaration = parse_declaration(line);
                if declaration.is_none() {
                    log::warn!("Skipping malformed binding declaration: {}", line.trim());
                }
                declaration
            })
            .collect();

        let mut attributes: Vec<(String, u32, String)> = Vec::new();
        for line in raw.lines().filter(|line| line.contains(ATTRIBUTE_MARKER)) {
            match parse_attribute(line) {
                Some(attribute) => {
                    if let Some(pos) = attributes.iter().position(|(s, _, _)| *s == attribute.0) {
                        log::warn!("Attribute {} is declared twice, keeping the last one.", attribute.0);
                        attributes.remove(pos);
                    }
                    attributes.push(attribute);
                }
                None => log::warn!("Skipping malformed attribute declaration: {}", line.trim()),
            }
        }

        let document: ShaderDocument = serde_json::from_str(&strip_annotations(&raw))?;
        let vertex = document.vertex.ok_or_else(|| ShaderError::MissingStage {
            shader: document.name.clone(),
            stage: "vertex",
        })?;
        let fragment = document.fragment.ok_or_else(|| ShaderError::MissingStage {
            shader: document.name.clone(),
            stage: "fragment",
        })?;

        let mut attributes = attributes
            .into_iter()
            .map(|(semantic, location, datatype)| {
                let format = vertex_format(&datatype).ok_or_else(|| {
                    ShaderError::UnsupportedAttribute {
                        semantic: semantic.clone(),
                        datatype: datatype.clone(),
                    }
                })?;
                Ok(AttributeSlot {
                    semantic,
                    location,
                    datatype,
                    format,
                    stride: format.size(),
                })
            })
            .collect::<Result<Vec<_>, ShaderError>>()?;
        attributes.sort_by_key(|attribute| attribute.location);

        let groups = group_declarations(&document.name, declarations, &vertex, &fragment)?;

        let source = Self {
            name: document.name,
            vertex,
            fragment,
            group_names: document.bind_groups,
            requires: document.requires,
            attributes,
            groups,
        };
        source.check_required_tags()?;
        Ok(source)
    }

    fn check_required_tags(&self) -> Result<(), ShaderError> {
        let missing: Vec<String> = self
            .requires
            .iter()
            .filter(|tag| self.query_tag(tag).is_empty())
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ShaderError::MissingTags {
                shader: self.name.clone(),
                tags: missing,
            })
        }
    }

    /// All entries, across every group, for which `predicate` holds.
    pub fn query(&self, predicate: impl Fn(&GroupEntry) -> bool) -> Vec<QueriedEntry<'_>> {
        self.groups
            .iter()
            .flat_map(|group| {
                group
                    .entries
                    .iter()
                    .enumerate()
                    .map(move |(slot, entry)| QueriedEntry {
                        group: group.index,
                        slot: slot as u32,
                        entry,
                    })
            })
            .filter(|queried| predicate(queried.entry))
            .collect()
    }

    pub fn query_tag(&self, tag: &str) -> Vec<QueriedEntry<'_>> {
        self.query(|entry| entry.tag.as_deref() == Some(tag))
    }

    /// Resolve a logical group name to its declared group index.
    pub fn group_index(&self, name: &str) -> Option<u32> {
        self.group_names.get(name).copied()
    }

    pub fn group(&self, index: u32) -> Option<&NativeGroup> {
        self.groups.iter().find(|group| group.index == index)
    }

    pub fn attribute(&self, semantic: &str) -> Option<&AttributeSlot> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }
}

fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| match line.find("//") {
            Some(at) => &line[..at],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `@attribute=NAME ` and `@tag(..)` and flatten control characters, so
/// what remains is valid JSON wrapping valid WGSL.
fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let attribute = rest.find(ATTRIBUTE_MARKER);
        let tag = rest.find(TAG_MARKER);
        let at = match (attribute, tag) {
            (None, None) => break,
            (Some(a), Some(t)) => a.min(t),
            (Some(a), None) => a,
            (None, Some(t)) => t,
        };
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        if Some(at) == tag {
            rest = rest.find(')').map_or("", |end| &rest[end + 1..]);
        } else {
            let name = &rest[ATTRIBUTE_MARKER.len()..];
            let end = name.find(|c: char| !is_ident(c)).unwrap_or(name.len());
            rest = &name[end..];
            if rest.starts_with(char::is_whitespace) {
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' | '\u{8}' | '\u{c}' => ' ',
            c => c,
        })
        .collect()
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Contents of the first `@marker(...)` on the line.
fn annotation<'a>(line: &'a str, marker: &str) -> Option<(&'a str, usize)> {
    let open = format!("@{marker}(");
    let start = line.find(&open)? + open.len();
    let len = line[start..].find(')')?;
    Some((&line[start..start + len], start + len + 1))
}

fn annotation_number(line: &str, marker: &str) -> Option<(u32, usize)> {
    let (value, end) = annotation(line, marker)?;
    Some((value.trim().parse().ok()?, end))
}

/// Parse `@tag(t) @group(g) @binding(b) var<q> name: type;`. The tag is optional.
pub fn parse_declaration(line: &str) -> Option<Declaration> {
    let (group, group_end) = annotation_number(line, "group")?;
    let (binding, binding_end) = annotation_number(line, "binding")?;
    let tag = annotation(line, "tag")
        .map(|(tag, _)| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string);

    let rest = &line[group_end.max(binding_end)..];
    let decl = &rest[rest.find("var")?..];
    let decl_end = decl
        .find(|c: char| !(is_ident(c) || c.is_whitespace() || matches!(c, ':' | '<' | '>')))
        .unwrap_or(decl.len());
    let mut tokens = decl[..decl_end]
        .split(|c: char| !(is_ident(c) || c == '<' || c == '>'))
        .filter(|token| !token.is_empty());

    let qualifier = tokens.next()?.to_string();
    let name = tokens.next()?.to_string();
    let datatype = tokens.next()?.to_string();
    Some(Declaration {
        group,
        binding,
        qualifier,
        name,
        datatype,
        tag,
    })
}

/// Parse `@location(n) @attribute=SEMANTIC name: type,` into (semantic, location, type).
pub fn parse_attribute(line: &str) -> Option<(String, u32, String)> {
    let (location, _) = annotation_number(line, "location")?;
    let after = &line[line.find(ATTRIBUTE_MARKER)? + ATTRIBUTE_MARKER.len()..];
    let end = after.find(|c: char| !is_ident(c)).unwrap_or(after.len());
    let semantic = &after[..end];
    if semantic.is_empty() {
        return None;
    }
    let after = &after[end..];
    let ty = after[after.find(':')? + 1..].trim_start();
    let ty_end = ty
        .find(|c: char| !(is_ident(c) || c == '<' || c == '>'))
        .unwrap_or(ty.len());
    if ty_end == 0 {
        return None;
    }
    Some((semantic.to_string(), location, ty[..ty_end].to_string()))
}

/// Map a WGSL vertex input type to a vertex format.
pub fn vertex_format(datatype: &str) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    Some(match datatype {
        "f32" => F::Float32,
        "vec2<f32>" | "vec2f" => F::Float32x2,
        "vec3<f32>" | "vec3f" => F::Float32x3,
        "vec4<f32>" | "vec4f" => F::Float32x4,
        "vec2<f16>" | "vec2h" => F::Float16x2,
        "vec4<f16>" | "vec4h" => F::Float16x4,
        _ => return None,
    })
}

/// True if `name` occurs in `code` as a whole identifier.
pub fn references_identifier(code: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    code.match_indices(name).any(|(at, _)| {
        let before = code[..at].chars().next_back();
        let after = code[at + name.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

/// Fold repeated `(group, binding)` declarations into one. Each stage module
/// must declare the resources it uses, so a binding shared by both stages shows
/// up twice. Expects `members` sorted by binding.
fn merge_stage_declarations(
    group: u32,
    members: Vec<Declaration>,
) -> Result<Vec<Declaration>, ShaderError> {
    let mut merged: Vec<Declaration> = Vec::with_capacity(members.len());
    for declaration in members {
        match merged.last_mut() {
            Some(previous) if previous.binding == declaration.binding => {
                let tags_clash = matches!(
                    (&previous.tag, &declaration.tag),
                    (Some(a), Some(b)) if a != b
                );
                if previous.name != declaration.name
                    || previous.qualifier != declaration.qualifier
                    || previous.datatype != declaration.datatype
                    || tags_clash
                {
                    return Err(ShaderError::ConflictingBinding {
                        group,
                        binding: declaration.binding,
                        first: previous.name.clone(),
                        second: declaration.name,
                    });
                }
                if previous.tag.is_none() {
                    previous.tag = declaration.tag;
                }
            }
            _ => merged.push(declaration),
        }
    }
    Ok(merged)
}

fn group_declarations(
    shader: &str,
    declarations: Vec<Declaration>,
    vertex: &StageSource,
    fragment: &StageSource,
) -> Result<Vec<NativeGroup>, ShaderError> {
    let mut grouped: Vec<(u32, Vec<Declaration>)> = Vec::new();
    for declaration in declarations {
        match grouped.iter_mut().find(|(index, _)| *index == declaration.group) {
            Some((_, members)) => members.push(declaration),
            None => grouped.push((declaration.group, vec![declaration])),
        }
    }

    grouped
        .into_iter()
        .map(|(index, mut members)| {
            members.sort_by_key(|d| d.binding);
            let entries = merge_stage_declarations(index, members)?
                .into_iter()
                .map(|d| {
                    let kind = BindingKind::classify(&d.qualifier, &d.datatype).ok_or_else(|| {
                        ShaderError::UnsupportedBinding {
                            name: d.name.clone(),
                            datatype: d.datatype.clone(),
                        }
                    })?;
                    let mut visibility = wgpu::ShaderStages::NONE;
                    if references_identifier(&vertex.code, &d.name) {
                        visibility |= wgpu::ShaderStages::VERTEX;
                    }
                    if references_identifier(&fragment.code, &d.name) {
                        visibility |= wgpu::ShaderStages::FRAGMENT;
                    }
                    if visibility.is_empty() {
                        log::warn!("Binding {} is not referenced by any stage of {shader}.", d.name);
                    }
                    Ok(GroupEntry {
                        name: d.name,
                        qualifier: d.qualifier,
                        datatype: d.datatype,
                        tag: d.tag,
                        kind,
                        visibility,
                    })
                })
                .collect::<Result<Vec<_>, ShaderError>>()?;

            Ok(NativeGroup {
                label: format!("{shader}_bind_group_{index}"),
                index,
                entries,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader(vertex: &str, fragment: &str, extra: &str) -> String {
        format!(
            r#"{{
    "name": "test",
    "vertex": {{ "entry": "vmain", "code": "{vertex}" }},
    "fragment": {{ "entry": "fmain", "code": "{fragment}" }}{extra}
}}"#
        )
    }

    #[test]
    fn declaration_with_tag() {
        let d = parse_declaration(
            "@tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;",
        )
        .unwrap();
        assert_eq!(d.group, 1);
        assert_eq!(d.binding, 0);
        assert_eq!(d.qualifier, "var<uniform>");
        assert_eq!(d.name, "mdl_m");
        assert_eq!(d.datatype, "mat4x4f");
        assert_eq!(d.tag.as_deref(), Some("local_to_world_matrix"));
    }

    #[test]
    fn declaration_without_tag_and_spaced_colon() {
        let d = parse_declaration("  @group(1) @binding(2) var t_albedo : texture_2d<f32>;").unwrap();
        assert_eq!(d.qualifier, "var");
        assert_eq!(d.name, "t_albedo");
        assert_eq!(d.datatype, "texture_2d<f32>");
        assert_eq!(d.tag, None);
    }

    #[test]
    fn malformed_declarations_are_skipped() {
        assert_eq!(parse_declaration("@group(1) var<uniform> m: mat4x4f;"), None);
        assert_eq!(parse_declaration("@group(x) @binding(0) var<uniform> m: mat4x4f;"), None);
        assert_eq!(parse_declaration("@group(0) @binding(0) var<uniform> m"), None);
    }

    #[test]
    fn attribute_line() {
        assert_eq!(
            parse_attribute("@location(2) @attribute=TEXCOORD_0   uv: vec2<f32>, // uv"),
            Some(("TEXCOORD_0".to_string(), 2, "vec2<f32>".to_string()))
        );
        assert_eq!(parse_attribute("@attribute=NORMAL nor: vec3<f32>,"), None);
    }

    #[test]
    fn annotations_are_removed_before_json() {
        let stripped = strip_annotations(
            "@tag(view) @group(0) x\n@location(0) @attribute=POSITION pos: vec3<f32>,\t",
        );
        assert_eq!(stripped, " @group(0) x @location(0) pos: vec3<f32>, ");
    }

    #[test]
    fn identifier_search_respects_boundaries() {
        assert!(references_identifier("o.pos = prj_m*mdl_m;", "mdl_m"));
        assert!(!references_identifier("o.pos = prj_m*mdl_m2;", "mdl_m"));
        assert!(!references_identifier("let xmdl_m = 1;", "mdl_m"));
        assert!(references_identifier("mdl", "mdl"));
    }

    #[test]
    fn vertex_formats() {
        assert_eq!(vertex_format("vec3<f32>"), Some(wgpu::VertexFormat::Float32x3));
        assert_eq!(vertex_format("vec2f"), Some(wgpu::VertexFormat::Float32x2));
        assert_eq!(vertex_format("vec4<f16>"), Some(wgpu::VertexFormat::Float16x4));
        assert_eq!(vertex_format("vec3<f16>"), None);
        assert_eq!(wgpu::VertexFormat::Float32x3.size(), 12);
    }

    #[test]
    fn bindings_are_sorted_then_renumbered() {
        let vertex = "\
            @group(0) @binding(2) var<uniform> c: mat4x4f;\n\
            @group(0) @binding(0) var<uniform> a: mat4x4f;\n\
            @group(0) @binding(1) var<uniform> b: mat4x4f;\n\
            @vertex fn vmain() -> @builtin(position) vec4f { return a*b*c*vec4f(0.0); }";
        let source = ShaderSource::parse(&shader(vertex, "@fragment fn fmain() {}", "")).unwrap();
        assert_eq!(source.groups.len(), 1);
        let names: Vec<_> = source.groups[0].entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(source.groups[0].label, "test_bind_group_0");
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let vertex = "\
            @group(1) @binding(0) var<uniform> m: mat4x4f;\n\
            @group(0) @binding(0) var<uniform> p: mat4x4f;\n\
            @group(1) @binding(1) var<uniform> n: mat4x4f;";
        let source = ShaderSource::parse(&shader(vertex, "", "")).unwrap();
        let order: Vec<_> = source.groups.iter().map(|g| g.index).collect();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(source.group(1).map(|g| g.entries.len()), Some(2));
    }

    #[test]
    fn visibility_and_kind_follow_usage() {
        let vertex = "\
            @group(1) @binding(0) var<uniform> mdl: mat4x4f;\n\
            fn vmain() { let m = mdl; }";
        let fragment = "\
            @group(1) @binding(0) var<uniform> mdl: mat4x4f;\n\
            @group(1) @binding(1) var t: texture_2d<f32>;\n\
            @group(1) @binding(2) var s: sampler;\n\
            fn fmain() { let c = textureSample(t, s, vec2f(0.0)); let k = mdl; }";
        let source = ShaderSource::parse(&shader(vertex, fragment, "")).unwrap();
        let group = source.group(1).unwrap();

        let mdl = group.entry("mdl").unwrap();
        assert_eq!(mdl.kind, BindingKind::Uniform);
        assert_eq!(mdl.visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);

        let t = group.entry("t").unwrap();
        assert_eq!(t.kind, BindingKind::Texture);
        assert_eq!(t.visibility, wgpu::ShaderStages::FRAGMENT);
        assert_eq!(group.entry("s").unwrap().kind, BindingKind::Sampler);
        assert_eq!(group.entries.len(), 3);
    }

    #[test]
    fn binding_declared_by_both_stages_is_merged() {
        let vertex = "\
            @tag(view_matrix) @group(0) @binding(0) var<uniform> vw_m: mat4x4f;\n\
            @vertex fn vmain() -> @builtin(position) vec4f { return vw_m*vec4f(0.0); }";
        let fragment = "\
            @group(0) @binding(0) var<uniform> vw_m: mat4x4f;\n\
            @fragment fn fmain() -> @location(0) vec4f { return vw_m[3]; }";
        let source = ShaderSource::parse(&shader(vertex, fragment, "")).unwrap();
        let group = source.group(0).unwrap();
        assert_eq!(group.entries.len(), 1);
        let vw = &group.entries[0];
        assert_eq!(vw.name, "vw_m");
        assert_eq!(vw.visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);
        assert_eq!(vw.tag.as_deref(), Some("view_matrix"));
    }

    #[test]
    fn attributes_are_sorted_by_location() {
        let vertex = "\
            struct a2v {\n\
                @location(1) @attribute=NORMAL nor: vec3<f32>, // normal\n\
                @location(0) @attribute=POSITION pos: vec3<f32>,\n\
            };";
        let source = ShaderSource::parse(&shader(vertex, "", "")).unwrap();
        let semantics: Vec<_> = source.attributes.iter().map(|a| a.semantic.as_str()).collect();
        assert_eq!(semantics, vec!["POSITION", "NORMAL"]);
        assert_eq!(source.attribute("NORMAL").map(|a| a.stride), Some(12));
        assert!(!source.vertex.code.contains("@attribute"));
        assert!(!source.vertex.code.contains("// normal"));
    }

    #[test]
    fn query_and_group_names() {
        let vertex = "\
            @tag(perspective_projection_matrix) @group(0) @binding(0) var<uniform> prj_m: mat4x4f;\n\
            @tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;";
        let text = shader(vertex, "", r#", "bind_groups": { "VIEW_INDEX": 0, "OBJECT_INDEX": 1 }"#);
        let source = ShaderSource::parse(&text).unwrap();

        let hits = source.query_tag("local_to_world_matrix");
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].group, hits[0].slot), (1, 0));
        assert_eq!(hits[0].entry.name, "mdl_m");
        assert_eq!(source.query(|e| e.datatype == "mat4x4f").len(), 2);
        assert_eq!(source.group_index("OBJECT_INDEX"), Some(1));
        assert_eq!(source.group_index("MATERIAL_INDEX"), None);
    }

    #[test]
    fn required_tags_must_be_declared() {
        let vertex = "@tag(local_to_world_matrix) @group(1) @binding(0) var<uniform> mdl_m: mat4x4f;";
        let text = shader(
            vertex,
            "",
            r#", "requires": ["local_to_world_matrix", "albedo_texture"]"#,
        );
        match ShaderSource::parse(&text) {
            Err(ShaderError::MissingTags { shader, tags }) => {
                assert_eq!(shader, "test");
                assert_eq!(tags, vec!["albedo_texture".to_string()]);
            }
            other => panic!("expected missing tags, got {other:?}"),
        }
    }

    #[test]
    fn missing_stage_fails() {
        let text = r#"{ "name": "half", "vertex": { "entry": "vmain", "code": "" } }"#;
        assert!(matches!(
            ShaderSource::parse(text),
            Err(ShaderError::MissingStage { stage: "fragment", .. })
        ));
    }

    #[test]
    fn invalid_json_fails() {
        assert!(matches!(
            ShaderSource::parse("{ \"name\": "),
            Err(ShaderError::Json(_))
        ));
    }

    #[test]
    fn unsupported_types_fail() {
        let vertex = "@group(0) @binding(0) var<storage> data: array<f32>;";
        assert!(matches!(
            ShaderSource::parse(&shader(vertex, "", "")),
            Err(ShaderError::UnsupportedBinding { .. })
        ));

        let vertex = "@location(0) @attribute=JOINTS_0 j: vec4<u32>,";
        assert!(matches!(
            ShaderSource::parse(&shader(vertex, "", "")),
            Err(ShaderError::UnsupportedAttribute { .. })
        ));
    }

    #[test]
    fn conflicting_bindings_fail() {
        let vertex = "@group(0) @binding(0) var<uniform> a: mat4x4f;";
        let fragment = "@group(0) @binding(0) var<uniform> b: mat4x4f;";
        assert!(matches!(
            ShaderSource::parse(&shader(vertex, fragment, "")),
            Err(ShaderError::ConflictingBinding { group: 0, binding: 0, first, second })
                if first == "a" && second == "b"
        ));

        let vertex = "@group(0) @binding(0) var<uniform> a: mat4x4f;";
        let fragment = "@group(0) @binding(0) var<uniform> a: vec4f;";
        assert!(matches!(
            ShaderSource::parse(&shader(vertex, fragment, "")),
            Err(ShaderError::ConflictingBinding { .. })
        ));
    }
}
