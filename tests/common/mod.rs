//! Common test utilities and helpers for ghmirror tests
#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A `/user/repos` entry the way GitHub returns it
pub fn repo_json(owner: &str, name: &str) -> Value {
    json!({
        "id": 1,
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "private": false,
        "owner": { "login": owner, "type": "User" },
        "ssh_url": format!("git@github.com:{}/{}.git", owner, name),
        "clone_url": format!("https://github.com/{}/{}.git", owner, name),
        "default_branch": "main"
    })
}

/// Route serving page `number` of a listing (page 1 is the real endpoint)
pub fn page_route(number: usize) -> String {
    if number == 1 {
        "/user/repos".to_string()
    } else {
        format!("/pages/{}", number)
    }
}

/// Serve `pages` as a paginated listing linked with `rel="next"`.
///
/// Every page expects exactly one request.
pub async fn mount_listing(server: &MockServer, pages: Vec<Vec<Value>>) {
    let total = pages.len();

    for (index, page) in pages.into_iter().enumerate() {
        let number = index + 1;
        let mut response = ResponseTemplate::new(200).set_body_json(Value::Array(page));

        if number < total {
            let link = format!(
                "<{uri}{next}>; rel=\"next\", <{uri}{last}>; rel=\"last\"",
                uri = server.uri(),
                next = page_route(number + 1),
                last = page_route(total),
            );
            response = response.insert_header("Link", link.as_str());
        }

        Mock::given(method("GET"))
            .and(path(page_route(number)))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }
}

/// Names of the repositories in a listing, in order
pub fn names(repos: &[ghmirror::RepoSpec]) -> Vec<String> {
    repos.iter().map(|r| r.full_name()).collect()
}

/// A stand-in for git that records every call.
///
/// `clone` creates `<target>/.git` when the fake succeeds, so a second run
/// sees a valid mirror.
#[cfg(unix)]
pub struct FakeGit {
    pub binary: PathBuf,
    pub log: PathBuf,
}

#[cfg(unix)]
impl FakeGit {
    pub fn install(dir: &Path, exit_code: i32) -> Self {
        Self::with_body(
            dir,
            &format!(
                r#"if [ "$1" = "clone" ] && [ {code} -eq 0 ]; then
    mkdir -p "$3/.git"
fi
if [ {code} -ne 0 ]; then
    echo "fatal: simulated failure" >&2
fi
exit {code}
"#,
                code = exit_code,
            ),
        )
    }

    /// A fake git running `body` after the call has been logged
    pub fn with_body(dir: &Path, body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let binary = dir.join("fake-git");
        let log = dir.join("git-calls.log");
        let script = format!(
            "#!/bin/sh\nprintf '%s|%s\\n' \"$(pwd -P)\" \"$*\" >> '{log}'\n{body}",
            log = log.display(),
            body = body,
        );

        std::fs::write(&binary, script).expect("Failed to write fake git");
        let mut permissions = std::fs::metadata(&binary)
            .expect("Failed to stat fake git")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&binary, permissions).expect("Failed to chmod fake git");

        Self { binary, log }
    }

    /// `(working directory, arguments)` per invocation
    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        let content = std::fs::read_to_string(&self.log).unwrap_or_default();
        content
            .lines()
            .filter_map(|line| line.split_once('|'))
            .map(|(cwd, args)| (PathBuf::from(cwd), args.to_string()))
            .collect()
    }

    pub fn clone_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(_, args)| args.starts_with("clone "))
            .map(|(_, args)| args)
            .collect()
    }

    pub fn fetch_dirs(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter(|(_, args)| args == "fetch --all --prune")
            .map(|(cwd, _)| cwd)
            .collect()
    }
}
