use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;

fn sparqlc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sparqlc"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let mut base = std::env::temp_dir();
    base.push(format!("sparqlc-cli-{}-{}", name, std::process::id()));
    if base.exists() {
        let _ = fs::remove_dir_all(&base);
    }
    fs::create_dir_all(&base).unwrap();
    base
}

fn run(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(sparqlc_bin())
        .args(args)
        .env_remove("SPARQLC_LOG")
        .env_remove("RUST_LOG")
        .env("NO_PROXY", "127.0.0.1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn sparqlc");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

/// Answers `count` requests with the same SPARQL XML document.
fn serve_xml(body: &'static str, count: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/sparql", listener.local_addr().unwrap());
    thread::spawn(move || {
        for _ in 0..count {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(&mut stream);
            let mut length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim_end().is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0; length];
            reader.read_exact(&mut request_body).unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/sparql-results+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
    });
    endpoint
}

const SELECT: &str = r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#">
  <head><variable name="planet"/><variable name="moons"/><variable name="orbits"/></head>
  <results>
    <result>
      <binding name="planet"><uri>http://dbpedia.org/resource/Neptune</uri></binding>
      <binding name="orbits"><literal datatype="http://www.w3.org/2001/XMLSchema#integer">86331</literal></binding>
    </result>
  </results>
</sparql>"#;

const ASK: &str = r#"<sparql xmlns="http://www.w3.org/2005/sparql-results#"><head/><boolean>true</boolean></sparql>"#;

#[test]
fn help_lists_options() {
    let out = run(&["--help"], "");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--interactive"));
    assert!(stdout.contains("--default-graph"));
}

#[test]
fn version_flag() {
    let out = run(&["--version"], "");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_endpoint_fails() {
    let out = run(&[], "ASK {}");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("No endpoint given"));
}

#[test]
fn unreachable_endpoint_fails() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let endpoint = format!("http://127.0.0.1:{port}/sparql");
    let out = run(&[&endpoint, "--timeout", "5"], "ASK {}");
    assert!(!out.status.success());
}

#[test]
fn batch_select_prints_tab_separated_rows() {
    let endpoint = serve_xml(SELECT, 1);
    let out = run(&[&endpoint], "SELECT ?planet ?moons ?orbits\nWHERE { ?planet ?p ?orbits }\n");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "http://dbpedia.org/resource/Neptune\t\t86331\n"
    );
}

#[test]
fn interactive_runs_each_block() {
    let endpoint = serve_xml(ASK, 2);
    let out = run(&["-i", &endpoint, "--method", "get"], "ASK\n{ ?s ?p ?o }\n\nASK {}\n");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "true\ntrue\n");
}

#[test]
fn show_config_from_file() {
    let root = tmp_dir("config");
    let path = root.join("endpoint.json");
    fs::write(
        &path,
        r#"{"endpoint": "http://example.com/sparql", "method": "post-url-encoded", "prefixes": {"ex": "http://example.com/"}}"#,
    )
    .unwrap();
    let out = run(
        &[
            "--config",
            path.to_str().unwrap(),
            "--named-graph",
            "urn:n1",
            "--show-config",
        ],
        "",
    );
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Endpoint: http://example.com/sparql"));
    assert!(stdout.contains("Method: post-url-encoded"));
    assert!(stdout.contains("ex: <http://example.com/>"));
    assert!(stdout.contains("- urn:n1"));
    let _ = fs::remove_dir_all(&root);
}
