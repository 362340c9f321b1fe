use std::fs;
use std::path::Path;

use expander::{ErrorKind, InclusionError, ScriptEngine, Session, Settings};

fn session_in(dir: &Path, target: &str) -> Session<ScriptEngine> {
    let settings = Settings {
        target: target.into(),
        base_dir: Some(dir.to_path_buf()),
        ..Settings::default()
    };
    Session::new(ScriptEngine::new(), settings).expect("settings")
}

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    fs::write(path, contents).expect("write file");
}

#[test]
fn script_include_runs_in_the_document_namespace() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "setup.py", "print(\"loaded\")\nanswer = 6 * 7\n");

    let mut session = session_in(dir.path(), "html");
    let out = session
        .expand_str("doc.md", "%%%py{setup.py}\n%answer")
        .expect("expand");
    assert_eq!(out.to_string(), "loaded\n42");

    let mut session = session_in(dir.path(), "html");
    let out = session
        .expand_str("doc.md", "%%%py{setup.py};%answer")
        .expect("expand");
    assert_eq!(out.to_string(), "42");
}

#[test]
fn document_include_shares_variables() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "parts/intro.md", "%{greeting = \"hello\"}Intro says %who.\n");

    let mut session = session_in(dir.path(), "html");
    let out = session
        .expand_str("doc.md", "%{who = \"main\"}%%%md{parts/intro.md}Then %greeting.")
        .expect("expand");
    assert_eq!(out.to_string(), "Intro says main.\nThen hello.");
}

#[test]
fn included_nodes_are_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "eq.md", "%%(sym(\"x\") + 1)");

    let mut session = session_in(dir.path(), "html");
    let out = session.expand_str("doc.md", "See %%%md{eq.md}.").expect("expand");
    assert_eq!(out.to_string(), "See $x+1$.");
    assert_eq!(out.nodes().count(), 1);
}

#[test]
fn conditional_include_follows_the_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "web.md", "web content");
    write(dir.path(), "print.md", "print content");
    let source = "[%%%mdifformat{html, latex: web.md; pdf: print.md}]";

    let out = session_in(dir.path(), "html").expand_str("doc.md", source).expect("expand");
    assert_eq!(out.to_string(), "[web content]");

    let out = session_in(dir.path(), "pdf").expand_str("doc.md", source).expect("expand");
    assert_eq!(out.to_string(), "[print content]");

    let out = session_in(dir.path(), "docx").expand_str("doc.md", source).expect("expand");
    assert_eq!(out.to_string(), "[]");
}

#[test]
fn format_placeholder_in_include_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "style-latex.md", "latex style");
    write(dir.path(), "style-html.md", "html style");

    let mut session = session_in(dir.path(), "latex");
    let out = session
        .expand_str("doc.md", "%%%md{style-{format}.md}")
        .expect("expand");
    assert_eq!(out.to_string(), "latex style");
    assert_eq!(
        session.resolve_include(" style-{format}.md "),
        dir.path().join("style-latex.md")
    );
}

#[test]
fn include_cycles_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.md", "A %%%md{b.md}");
    write(dir.path(), "b.md", "B %%%md{a.md}");

    let mut session = session_in(dir.path(), "html");
    let err = session
        .expand_file(&dir.path().join("a.md"))
        .expect_err("cycle");
    let ErrorKind::Inclusion(InclusionError::Cycle { chain }) = &err.kind else {
        panic!("expected a cycle, got {:?}", err.kind);
    };
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.first(), chain.last());
    assert!(chain[1].ends_with("b.md"), "chain: {chain:?}");
}

#[test]
fn including_the_same_file_twice_is_not_a_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "x.md", "x");

    let mut session = session_in(dir.path(), "html");
    let out = session
        .expand_str("doc.md", "%%%md{x.md}%%%md{x.md}")
        .expect("expand");
    assert_eq!(out.to_string(), "xx");
}

#[test]
fn missing_includes_list_nearby_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "chapters/one.md", "1");
    write(dir.path(), "chapters/two.md", "2");

    let mut session = session_in(dir.path(), "html");
    let source = "%%%md{chapters/three.md}";
    let err = session.expand_str("doc.md", source).expect_err("missing");

    let ErrorKind::Inclusion(InclusionError::NotFound { path, nearby, .. }) = &err.kind else {
        panic!("expected not found, got {:?}", err.kind);
    };
    assert_eq!(path, "chapters/three.md");
    assert_eq!(nearby, &["one.md".to_string(), "two.md".to_string()]);
    assert_eq!(&source[err.span.clone()], "chapters/three.md");
    assert!(err.notes.iter().any(|n| n.contains("one.md, two.md")));

    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code.as_deref(), Some("include"));
}

#[test]
fn errors_inside_included_scripts_point_at_the_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "broken.py", "x = 1\ny = x + nope\n");

    let mut session = session_in(dir.path(), "html");
    let err = session
        .expand_str("doc.md", "%%%py{broken.py}")
        .expect_err("error");
    assert_eq!(err.kind, ErrorKind::Eval("name 'nope' is not defined".into()));
    assert_ne!(err.file_id, 0);

    let files = session.files();
    let script = codespan_reporting::files::Files::source(files, err.file_id).expect("source");
    assert_eq!(&script[err.span.clone()], "nope");
    assert!(err.notes.iter().any(|n| n.contains("included as `broken.py`")));
}
