//! libssh2-backed [`SftpTransport`].

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

use postalgic_core::SftpConfig;
use ssh2::{ErrorCode, Session, Sftp};

use super::SftpTransport;
use crate::error::{Operation, PublishError};

/// `LIBSSH2_FX_NO_SUCH_FILE`
const FX_NO_SUCH_FILE: i32 = 2;

pub struct Ssh2Transport {
    config: SftpConfig,
    session: Option<(Session, Sftp)>,
}

impl Ssh2Transport {
    pub fn new(config: SftpConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    fn sftp(&self) -> Result<&Sftp, PublishError> {
        self.session
            .as_ref()
            .map(|(_, sftp)| sftp)
            .ok_or_else(|| PublishError::Connection {
                target: self.describe(),
                message: "not connected".into(),
            })
    }

    fn open_session(&self) -> Result<(Session, Sftp), String> {
        let tcp = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .map_err(|e| e.to_string())?;
        let mut session = Session::new().map_err(|e| e.to_string())?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| e.to_string())?;

        let user = self.config.username.as_str();
        match (&self.config.private_key_path, &self.config.password) {
            (Some(key), _) => session.userauth_pubkey_file(
                user,
                None,
                key,
                self.config.private_key_passphrase.as_deref(),
            ),
            (None, Some(password)) => session.userauth_password(user, password),
            (None, None) => session.userauth_agent(user),
        }
        .map_err(|e| format!("authentication failed: {e}"))?;
        if !session.authenticated() {
            return Err("authentication rejected".into());
        }

        let sftp = session.sftp().map_err(|e| e.to_string())?;
        Ok((session, sftp))
    }

    fn walk(
        &self,
        sftp: &Sftp,
        dir: &Path,
        root: &Path,
        out: &mut Vec<String>,
    ) -> Result<(), ssh2::Error> {
        for (path, stat) in sftp.readdir(dir)? {
            if stat.is_dir() {
                self.walk(sftp, &path, root, out)?;
            } else if stat.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    let key: Vec<_> = rel.iter().map(|c| c.to_string_lossy()).collect();
                    out.push(key.join("/"));
                }
            }
        }
        Ok(())
    }
}

fn is_not_found(e: &ssh2::Error) -> bool {
    matches!(e.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE))
}

impl SftpTransport for Ssh2Transport {
    fn describe(&self) -> String {
        format!("sftp://{}@{}:{}", self.config.username, self.config.host, self.config.port)
    }

    fn connect(&mut self) -> Result<(), PublishError> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = self.open_session().map_err(|message| PublishError::Connection {
            target: self.describe(),
            message,
        })?;
        tracing::debug!(target_name = %self.describe(), "sftp session established");
        self.session = Some(session);
        Ok(())
    }

    fn is_dir(&mut self, path: &str) -> Result<bool, PublishError> {
        match self.sftp()?.stat(Path::new(path)) {
            Ok(stat) => Ok(stat.is_dir()),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(PublishError::transfer(Operation::List, path, e)),
        }
    }

    fn mkdir(&mut self, path: &str) -> Result<(), PublishError> {
        self.sftp()?
            .mkdir(Path::new(path), 0o755)
            .map_err(|e| PublishError::transfer(Operation::CreateDir, path, e))
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), PublishError> {
        let mut file = self
            .sftp()?
            .create(Path::new(path))
            .map_err(|e| PublishError::transfer(Operation::Upload, path, e))?;
        file.write_all(contents)
            .map_err(|e| PublishError::transfer(Operation::Upload, path, e))
    }

    fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>, PublishError> {
        let mut file = match self.sftp()?.open(Path::new(path)) {
            Ok(file) => file,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(PublishError::transfer(Operation::Download, path, e)),
        };
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| PublishError::transfer(Operation::Download, path, e))?;
        Ok(Some(contents))
    }

    fn remove_file(&mut self, path: &str) -> Result<(), PublishError> {
        match self.sftp()?.unlink(Path::new(path)) {
            Err(e) if !is_not_found(&e) => Err(PublishError::transfer(Operation::Delete, path, e)),
            _ => Ok(()),
        }
    }

    fn list_files(&mut self, root: &str) -> Result<Vec<String>, PublishError> {
        let sftp = self.sftp()?;
        let root_path = Path::new(root);
        let mut files = Vec::new();
        match self.walk(sftp, root_path, root_path, &mut files) {
            Ok(()) => Ok(files),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(PublishError::transfer(Operation::List, root, e)),
        }
    }
}
