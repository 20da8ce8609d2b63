//! Full clone against an in-memory remote.

use gitfs_git::{
    CancellationFlag, Client, ClientConfig, DeltaBuilder, GitError, Method, PackBuilder,
    PktLineReader, PktLineWriter, Request, Response, Transport, ADVERTISEMENT_CONTENT_TYPE,
    RESULT_CONTENT_TYPE,
};
use gitfs_storage::{ObjectId, ObjectType};
use gitfs_vfs::{FsError, MODE_DIR, MODE_FILE};
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

const README: &[u8] = b"# demo\n\nA small repository.\n";
const MAIN_RS: &[u8] = b"fn main() {\n    println!(\"hello\");\n}\n";

fn tree(entries: &[(&str, &str, ObjectId)]) -> Vec<u8> {
    let mut data = Vec::new();
    for (mode, name, id) in entries {
        data.extend_from_slice(format!("{mode} {name}\0").as_bytes());
        data.extend_from_slice(id.as_bytes());
    }
    data
}

/// A remote serving one branch whose commit is `refs/heads/main`.
struct FakeRemote {
    commit: ObjectId,
    pack: Vec<u8>,
    requests: Mutex<Vec<Request>>,
}

impl FakeRemote {
    fn new() -> Self {
        let readme = ObjectId::hash_object(ObjectType::Blob, README);
        let main_rs = ObjectId::hash_object(ObjectType::Blob, MAIN_RS);
        let src = tree(&[("100644", "main.rs", main_rs)]);
        let src_id = ObjectId::hash_object(ObjectType::Tree, &src);
        let root = tree(&[("100644", "README.md", readme), ("40000", "src", src_id)]);
        let root_id = ObjectId::hash_object(ObjectType::Tree, &root);
        let commit = format!(
            "tree {root_id}\nauthor Dev <dev@example.com> 1700000000 +0000\n\
             committer Dev <dev@example.com> 1700000000 +0000\n\ninitial\n"
        );
        let commit_id = ObjectId::hash_object(ObjectType::Commit, commit.as_bytes());

        // main.rs travels as a delta against README to exercise reconstruction.
        let main_delta = DeltaBuilder::new(README.len()).insert(MAIN_RS).build();

        let mut builder = PackBuilder::new();
        builder.add(ObjectType::Commit, commit.as_bytes());
        builder.add(ObjectType::Tree, &root);
        builder.add(ObjectType::Tree, &src);
        let readme_index = builder.add(ObjectType::Blob, README);
        builder.add_ofs_delta(readme_index, &main_delta);

        Self {
            commit: commit_id,
            pack: builder.build().unwrap(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn command(body: &[u8]) -> String {
        let mut reader = PktLineReader::new(body);
        reader.lines().unwrap().remove(0)
    }

    fn respond(&self, content_type: &str, body: Vec<u8>) -> io::Result<Response> {
        Ok(Response {
            status: 200,
            content_type: content_type.to_string(),
            body: Box::new(Cursor::new(body)),
        })
    }
}

impl Transport for FakeRemote {
    fn send(&self, request: Request) -> io::Result<Response> {
        self.requests.lock().unwrap().push(request.clone());

        let mut body = Vec::new();
        let mut writer = PktLineWriter::new(&mut body);
        if request.method == Method::Get {
            writer.write_str("# service=git-upload-pack\n").unwrap();
            writer.close().unwrap();
            for line in ["version 2\n", "ls-refs=unborn\n", "fetch=shallow\n"] {
                writer.write_str(line).unwrap();
            }
            writer.close().unwrap();
            return self.respond(ADVERTISEMENT_CONTENT_TYPE, body);
        }

        match Self::command(&request.body).as_str() {
            "command=ls-refs" => {
                writer
                    .write_str(&format!(
                        "{} HEAD symref-target:refs/heads/main\n",
                        self.commit
                    ))
                    .unwrap();
                writer
                    .write_str(&format!("{} refs/heads/main\n", self.commit))
                    .unwrap();
                writer.close().unwrap();
            }
            "command=fetch" => {
                writer.write_str("shallow-info\n").unwrap();
                writer
                    .write_str(&format!("shallow {}\n", self.commit))
                    .unwrap();
                writer.delimiter().unwrap();
                writer.write_str("packfile\n").unwrap();
                writer.write_data(b"\x02Counting objects: 5, done.\n").unwrap();
                for chunk in self.pack.chunks(7) {
                    let mut packet = vec![1u8];
                    packet.extend_from_slice(chunk);
                    writer.write_data(&packet).unwrap();
                }
                writer.close().unwrap();
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unexpected command {other}"),
                ))
            }
        }
        self.respond(RESULT_CONTENT_TYPE, body)
    }
}

#[test]
fn clone_branch_and_browse() {
    let remote = FakeRemote::new();
    let client = Client::connect("https://example.com/demo.git", &remote).unwrap();

    let (commit, fs) = client.clone("refs/heads/main").unwrap();
    assert_eq!(commit, remote.commit);

    assert_eq!(fs.read("README.md").unwrap(), README);
    assert_eq!(fs.read("src/main.rs").unwrap(), MAIN_RS);

    let info = fs.stat("src").unwrap();
    assert!(info.is_dir());
    assert_eq!(info.mode, MODE_DIR);

    let mut root = fs.open(".").unwrap();
    let page = root.read_dir(None).unwrap();
    let names: Vec<_> = page.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["README.md", "src"]);
    assert_eq!(page.entries[0].mode, MODE_FILE);
    assert_eq!(page.entries[0].size, README.len() as u64);
    assert!(root.read_dir(None).unwrap().end);

    let mut file = fs.open("src/main.rs").unwrap().into_file().unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    assert!(text.contains("println!"));

    assert!(matches!(
        fs.open("src/lib.rs"),
        Err(FsError::PathNotFound { .. })
    ));

    let methods: Vec<_> = remote
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, [Method::Get, Method::Post, Method::Post]);
}

#[test]
fn clone_unknown_branch() {
    let remote = FakeRemote::new();
    let client = Client::connect("https://example.com/demo.git", &remote).unwrap();
    assert!(matches!(
        client.clone("refs/heads/missing"),
        Err(GitError::UnknownRef(_))
    ));
}

#[test]
fn clone_by_hash_skips_ref_listing() {
    let remote = FakeRemote::new();
    let client = Client::connect("https://example.com/demo.git", &remote).unwrap();
    let (commit, fs) = client.clone(&remote.commit.to_hex()).unwrap();
    assert_eq!(commit, remote.commit);
    assert_eq!(fs.store().len(), 5);
    assert_eq!(remote.requests.lock().unwrap().len(), 2);
}

#[test]
fn cancelled_clone() {
    let remote = FakeRemote::new();
    let flag = CancellationFlag::new();
    let client = Client::connect_with(
        "https://example.com/demo.git",
        &remote,
        ClientConfig::default(),
        flag.clone(),
    )
    .unwrap();
    flag.cancel();
    assert!(matches!(
        client.clone("refs/heads/main"),
        Err(GitError::Cancelled)
    ));
}
