//! Repository snapshot download, unpacking, config injection and repacking.
//!
//! A GitHub zipball unpacks to a single `<owner>-<repo>-<sha>` directory. The
//! tree is re-rooted under `<repo>-<sha>` so the application name can be
//! recovered by dropping the trailing commit segment, then zipped again with
//! paths relative to the tree root, which is the layout Elastic Beanstalk
//! expects from a source bundle.

use crate::error::{ArchiveError, EbDeployError, Result};
use crate::source::{RepoAccess, RepositorySource};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Directory Elastic Beanstalk reads configuration files from
pub const EXTENSIONS_DIR: &str = ".ebextensions";

/// One `option_settings` entry of a configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetting {
    pub option_name: String,
    pub value: String,
}

impl OptionSetting {
    pub fn new(option_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            option_name: option_name.into(),
            value: value.into(),
        }
    }
}

#[derive(Serialize)]
struct ConfigDocument<'a> {
    option_settings: &'a [OptionSetting],
}

/// A generated configuration file written into the repository before packaging
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigExtension {
    /// File stem; the file is `.ebextensions/<name>.config`
    pub name: String,
    pub settings: Vec<OptionSetting>,
}

impl std::fmt::Debug for ConfigExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Settings may carry credentials.
        f.debug_struct("ConfigExtension")
            .field("name", &self.name)
            .field("settings", &self.settings.len())
            .finish()
    }
}

impl ConfigExtension {
    pub fn render(&self) -> Result<String> {
        serde_yaml::to_string(&ConfigDocument {
            option_settings: &self.settings,
        })
        .map_err(|e| {
            ArchiveError::Render {
                name: self.name.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// The repacked repository, ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    /// Name of the unpacked tree, `<repo>-<sha>`
    pub name: String,
    /// Location of the zip on local disk
    pub path: PathBuf,
    /// Object key: the zip's base filename
    pub key: String,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the zip
    pub sha256: String,
}

/// Produces a deployable archive for a repository
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Download the repository, write `extensions` into it and repackage it
    async fn fetch(
        &self,
        source: &RepositorySource,
        extensions: &[ConfigExtension],
    ) -> Result<PackagedArchive>;
}

/// Where snapshots are fetched from and unpacked to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// GitHub REST API root
    pub api_base: String,
    /// GitHub web root used for public zipball links
    pub web_base: String,
    /// Directory downloads and unpacked trees are written to
    pub work_dir: PathBuf,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            web_base: "https://github.com".to_string(),
            work_dir: PathBuf::from("."),
        }
    }
}

/// Fetches repository snapshots from GitHub
pub struct GithubFetcher {
    api: reqwest::Client,
    downloads: reqwest::Client,
    settings: FetchSettings,
}

impl GithubFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let user_agent = concat!("ebdeploy/", env!("CARGO_PKG_VERSION"));
        // The archive link endpoint answers with a redirect we want to read, not follow.
        let api = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let downloads = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            api,
            downloads,
            settings,
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Resolve the URL the snapshot can be downloaded from
    pub async fn resolve_download_url(&self, source: &RepositorySource) -> Result<String> {
        match &source.access {
            RepoAccess::Public => Ok(format!(
                "{}/{}/{}/zipball/master",
                self.settings.web_base.trim_end_matches('/'),
                source.owner,
                source.repo
            )),
            RepoAccess::Private(token) => {
                let url = format!(
                    "{}/repos/{}/{}/zipball",
                    self.settings.api_base.trim_end_matches('/'),
                    source.owner,
                    source.repo
                );
                debug!(%url, "Requesting archive link");

                let response = self
                    .api
                    .get(&url)
                    .bearer_auth(token)
                    .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_redirection() {
                    return Err(ArchiveError::download_failed(format!(
                        "archive link request for {}/{} returned {}",
                        source.owner, source.repo, status
                    ))
                    .into());
                }

                response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ArchiveError::MissingRedirect {
                            owner: source.owner.clone(),
                            repo: source.repo.clone(),
                        }
                        .into()
                    })
            }
        }
    }

    /// Stream `url` to `dest`, returning the number of bytes written
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.downloads.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::download_failed(format!("{} returned {}", url, status)).into());
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(bytes = written, path = %dest.display(), "Repository archive downloaded");
        Ok(written)
    }
}

#[async_trait]
impl RepositoryFetcher for GithubFetcher {
    async fn fetch(
        &self,
        source: &RepositorySource,
        extensions: &[ConfigExtension],
    ) -> Result<PackagedArchive> {
        let url = self.resolve_download_url(source).await?;
        let work_dir = self.settings.work_dir.clone();
        fs::create_dir_all(&work_dir)?;

        let download_path = work_dir.join(format!("{}.zip", source.repo));
        self.download(&url, &download_path).await?;

        let repo = source.repo.clone();
        let extensions = extensions.to_vec();
        tokio::task::spawn_blocking(move || {
            let name = unpack(&download_path, &work_dir, &repo)?;
            let tree = work_dir.join(&name);
            for extension in &extensions {
                inject_config(&tree, extension)?;
            }
            repack(&tree)
        })
        .await
        .map_err(|e| EbDeployError::internal(format!("Packaging task failed: {}", e)))?
    }
}

/// Extract a GitHub zipball under `<work_dir>/<repo>-<sha>`, returning that directory name.
///
/// An existing directory of the same name is replaced.
pub fn unpack(zip_path: &Path, work_dir: &Path, repo: &str) -> Result<String> {
    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    let root = common_root(&mut archive)?;

    let commit = root.rsplit('-').next().unwrap_or(root.as_str());
    let name = format!("{}-{}", repo, commit);
    let dest = work_dir.join(&name);
    if dest.exists() {
        fs::remove_dir_all(&dest)?;
    }
    fs::create_dir_all(&dest)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let path = entry_path(entry.name(), entry.enclosed_name().map(|p| p.to_path_buf()))?;
        let relative = path
            .strip_prefix(&root)
            .map_err(|_| ArchiveError::malformed(format!("{} is outside {}", path.display(), root)))?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&out)?;
        io::copy(&mut entry, &mut file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out, fs::Permissions::from_mode(mode))?;
        }
    }

    debug!(name = %name, entries = archive.len(), "Archive unpacked");
    Ok(name)
}

fn entry_path(raw: &str, enclosed: Option<PathBuf>) -> Result<PathBuf> {
    enclosed.ok_or_else(|| ArchiveError::malformed(format!("unsafe entry path {}", raw)).into())
}

/// The single top-level directory every entry lives under
fn common_root<R: Read + io::Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let mut root: Option<String> = None;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let path = entry_path(entry.name(), entry.enclosed_name().map(|p| p.to_path_buf()))?;
        let first = path
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .map(str::to_string)
            .ok_or_else(|| ArchiveError::malformed(format!("empty entry name at {}", index)))?;

        let is_bare_file = path.components().count() == 1 && !entry.is_dir();
        match &root {
            _ if is_bare_file => {
                return Err(ArchiveError::malformed(format!(
                    "{} is not inside a top-level directory",
                    first
                ))
                .into());
            }
            None => root = Some(first),
            Some(existing) if *existing != first => {
                return Err(ArchiveError::malformed(format!(
                    "multiple top-level directories ({} and {})",
                    existing, first
                ))
                .into());
            }
            Some(_) => {}
        }
    }

    root.ok_or_else(|| ArchiveError::malformed("archive is empty").into())
}

/// Write `.ebextensions/<name>.config` into `tree`
pub fn inject_config(tree: &Path, extension: &ConfigExtension) -> Result<PathBuf> {
    let dir = tree.join(EXTENSIONS_DIR);
    fs::create_dir_all(&dir)?;

    let path = dir.join(format!("{}.config", extension.name));
    fs::write(&path, extension.render()?)?;

    debug!(path = %path.display(), "Configuration file written");
    Ok(path)
}

/// Zip `tree` (dotfiles included) into a sibling `<name>.zip`
pub fn repack(tree: &Path) -> Result<PackagedArchive> {
    let name = tree
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EbDeployError::validation(format!("{} has no usable name", tree.display())))?
        .to_string();
    let key = format!("{}.zip", name);
    let path = tree
        .parent()
        .map(|parent| parent.join(&key))
        .unwrap_or_else(|| PathBuf::from(&key));

    let mut writer = ZipWriter::new(File::create(&path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(tree).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(tree)
            .map_err(|e| EbDeployError::internal(e.to_string()))?;
        let entry_name = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", entry_name), options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(entry_name, file_options(options, &entry)?)?;
            io::copy(&mut File::open(entry.path())?, &mut writer)?;
        }
    }
    writer.finish()?;

    let size_bytes = fs::metadata(&path)?.len();
    let sha256 = sha256_file(&path)?;
    info!(key = %key, size_bytes, "Repository repackaged");

    Ok(PackagedArchive {
        name,
        path,
        key,
        size_bytes,
        sha256,
    })
}

#[cfg(unix)]
fn file_options(options: SimpleFileOptions, entry: &walkdir::DirEntry) -> Result<SimpleFileOptions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = entry.metadata()?.permissions().mode();
    Ok(options.unix_permissions(mode))
}

#[cfg(not(unix))]
fn file_options(options: SimpleFileOptions, _entry: &walkdir::DirEntry) -> Result<SimpleFileOptions> {
    Ok(options)
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::io::Write;

    /// Build a zip shaped like a GitHub zipball
    pub fn zipball(path: &Path, root: &str, files: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        writer.add_directory(format!("{}/", root), options).unwrap();
        for (name, contents) in files {
            writer
                .start_file(format!("{}/{}", root, name), options)
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    pub fn zipball_bytes(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshot.zip");
        zipball(&path, root, files);
        fs::read(path).unwrap()
    }

    pub fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::source::RuntimePlatform;
    use tempfile::TempDir;

    fn database_extension() -> ConfigExtension {
        ConfigExtension {
            name: "rds_env".to_string(),
            settings: vec![
                OptionSetting::new("RDS_HOSTNAME", "db.example.com"),
                OptionSetting::new("RDS_PASSWORD", "p@ss: 'word'"),
            ],
        }
    }

    #[test]
    fn test_unpack_reroots_under_repo_name() -> Result<()> {
        let temp = TempDir::new()?;
        let zip_path = temp.path().join("myapp.zip");
        zipball(
            &zip_path,
            "octo-myapp-1a2b3c4",
            &[("package.json", "{}"), ("src/index.js", "console.log(1)")],
        );

        let name = unpack(&zip_path, temp.path(), "myapp")?;

        assert_eq!(name, "myapp-1a2b3c4");
        let tree = temp.path().join(&name);
        assert_eq!(fs::read_to_string(tree.join("package.json"))?, "{}");
        assert!(tree.join("src/index.js").exists());
        Ok(())
    }

    #[test]
    fn test_unpack_replaces_previous_tree() -> Result<()> {
        let temp = TempDir::new()?;
        let zip_path = temp.path().join("myapp.zip");
        let stale = temp.path().join("myapp-1a2b3c4");
        fs::create_dir_all(&stale)?;
        fs::write(stale.join("stale.txt"), "old")?;
        zipball(&zip_path, "octo-myapp-1a2b3c4", &[("app.js", "x")]);

        unpack(&zip_path, temp.path(), "myapp")?;

        assert!(!stale.join("stale.txt").exists());
        assert!(stale.join("app.js").exists());
        Ok(())
    }

    #[test]
    fn test_unpack_rejects_multiple_roots() -> Result<()> {
        let temp = TempDir::new()?;
        let zip_path = temp.path().join("bad.zip");
        let mut writer = ZipWriter::new(File::create(&zip_path)?);
        let options = SimpleFileOptions::default();
        writer.start_file("one/a.txt", options)?;
        writer.start_file("two/b.txt", options)?;
        writer.finish()?;

        let result = unpack(&zip_path, temp.path(), "bad");
        assert!(matches!(
            result,
            Err(EbDeployError::Archive(ArchiveError::Malformed { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_unpack_rejects_non_zip() -> Result<()> {
        let temp = TempDir::new()?;
        let zip_path = temp.path().join("page.zip");
        fs::write(&zip_path, "<html>Not Found</html>")?;

        let result = unpack(&zip_path, temp.path(), "page");
        assert!(matches!(result, Err(EbDeployError::Archive(ArchiveError::Zip { .. }))));
        Ok(())
    }

    #[test]
    fn test_inject_config_renders_option_settings() -> Result<()> {
        let temp = TempDir::new()?;
        let path = inject_config(temp.path(), &database_extension())?;

        assert_eq!(path, temp.path().join(".ebextensions/rds_env.config"));
        let rendered = fs::read_to_string(&path)?;
        assert!(rendered.starts_with("option_settings:"));
        assert!(rendered.contains("option_name: RDS_HOSTNAME"));

        #[derive(Deserialize)]
        struct Parsed {
            option_settings: Vec<OptionSetting>,
        }
        let parsed: Parsed = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(parsed.option_settings[1].value, "p@ss: 'word'");
        Ok(())
    }

    #[test]
    fn test_repack_includes_dotfiles_relative_to_root() -> Result<()> {
        let temp = TempDir::new()?;
        let tree = temp.path().join("myapp-1a2b3c4");
        fs::create_dir_all(tree.join("src"))?;
        fs::write(tree.join("package.json"), "{}")?;
        fs::write(tree.join(".npmrc"), "save-exact=true")?;
        fs::write(tree.join("src/index.js"), "1")?;
        inject_config(&tree, &database_extension())?;

        let archive = repack(&tree)?;

        assert_eq!(archive.name, "myapp-1a2b3c4");
        assert_eq!(archive.key, "myapp-1a2b3c4.zip");
        assert_eq!(archive.path, temp.path().join("myapp-1a2b3c4.zip"));
        assert_eq!(archive.size_bytes, fs::metadata(&archive.path)?.len());
        assert_eq!(archive.sha256.len(), 64);

        let names = entry_names(&archive.path);
        assert!(names.contains(&".npmrc".to_string()));
        assert!(names.contains(&".ebextensions/rds_env.config".to_string()));
        assert!(names.contains(&"src/index.js".to_string()));
        assert!(names.iter().all(|n| !n.starts_with("myapp-1a2b3c4")));
        Ok(())
    }

    #[tokio::test]
    async fn test_public_download_url() -> Result<()> {
        let fetcher = GithubFetcher::new(FetchSettings::default())?;
        let source = RepositorySource::new("octo", "myapp", RepoAccess::Public, RuntimePlatform::Node);

        let url = fetcher.resolve_download_url(&source).await?;
        assert_eq!(url, "https://github.com/octo/myapp/zipball/master");
        Ok(())
    }

    #[tokio::test]
    async fn test_private_download_url_reads_redirect() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let link = server
            .mock("GET", "/repos/octo/secret/zipball")
            .match_header("authorization", "Bearer ghp_token")
            .with_status(302)
            .with_header("location", "https://codeload.example.com/octo/secret/legacy.zip?token=abc")
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(FetchSettings {
            api_base: server.url(),
            ..Default::default()
        })?;
        let source = RepositorySource::new(
            "octo",
            "secret",
            RepoAccess::Private("ghp_token".to_string()),
            RuntimePlatform::Go,
        );

        let url = fetcher.resolve_download_url(&source).await?;
        assert_eq!(url, "https://codeload.example.com/octo/secret/legacy.zip?token=abc");
        link.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_private_download_url_rejects_error_status() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/octo/secret/zipball")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(FetchSettings {
            api_base: server.url(),
            ..Default::default()
        })?;
        let source = RepositorySource::new(
            "octo",
            "secret",
            RepoAccess::Private("bad".to_string()),
            RuntimePlatform::Go,
        );

        let result = fetcher.resolve_download_url(&source).await;
        assert!(matches!(
            result,
            Err(EbDeployError::Archive(ArchiveError::DownloadFailed { .. }))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_public_repository_end_to_end() -> Result<()> {
        let temp = TempDir::new()?;
        let mut server = mockito::Server::new_async().await;
        let body = zipball_bytes("octo-myapp-9f8e7d6", &[("server.js", "listen()")]);
        server
            .mock("GET", "/octo/myapp/zipball/master")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(FetchSettings {
            web_base: server.url(),
            work_dir: temp.path().to_path_buf(),
            ..Default::default()
        })?;
        let source = RepositorySource::new("octo", "myapp", RepoAccess::Public, RuntimePlatform::Node);

        let archive = fetcher.fetch(&source, &[database_extension()]).await?;

        assert_eq!(archive.name, "myapp-9f8e7d6");
        assert!(temp.path().join("myapp.zip").exists());
        let names = entry_names(&archive.path);
        assert!(names.contains(&"server.js".to_string()));
        assert!(names.contains(&".ebextensions/rds_env.config".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_download_failure_status_is_error() -> Result<()> {
        let temp = TempDir::new()?;
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.zip")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = GithubFetcher::new(FetchSettings::default())?;
        let result = fetcher
            .download(&format!("{}/missing.zip", server.url()), &temp.path().join("x.zip"))
            .await;
        assert!(matches!(
            result,
            Err(EbDeployError::Archive(ArchiveError::DownloadFailed { .. }))
        ));
        Ok(())
    }
}
