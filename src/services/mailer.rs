use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_smtp::{
    authentication::{Credentials, Mechanism},
    EmailAddress, Envelope, SendableEmail, SmtpClient, SmtpTransport,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use itertools::Itertools;
use tokio::{io::BufStream, net::TcpStream};
use tokio_rustls::{
    rustls::{crypto::ring, pki_types::ServerName, ClientConfig, RootCertStore},
    TlsConnector,
};

use crate::configuration::EmailSettings;

pub const ATTACHMENT_NAME: &str = "extraction_data.csv";
const BASE64_LINE: usize = 76;

pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn csv(data: Vec<u8>) -> Self {
        Attachment {
            filename: ATTACHMENT_NAME.to_string(),
            content_type: "text/csv".to_string(),
            data,
        }
    }
}

pub fn report_subject(item_count: usize, url: &str) -> String {
    format!("Synapse AI Report: {} Items from {}", item_count, url)
}

pub fn report_body(item_count: usize, url: &str) -> String {
    format!(
        "<html><body>\
         <h2>Synapse extraction complete</h2>\
         <p>Target: <a href=\"{url}\">{url}</a></p>\
         <p>Items extracted: <b>{count}</b></p>\
         <p>The full table is attached as <code>{file}</code>.</p>\
         </body></html>",
        url = url,
        count = item_count,
        file = ATTACHMENT_NAME,
    )
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(BASE64_LINE)
        .map(|line| String::from_utf8_lossy(line))
        .join("\r\n")
}

/// Renders a multipart/mixed message with an HTML part and an optional
/// base64 attachment.
pub fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    html_body: &str,
    attachment: Option<&Attachment>,
    boundary: &str,
) -> String {
    let mut message = format!(
        "From: {from}\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         Message-ID: <{id}@synapse>\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\
         \r\n\
         --{boundary}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         \r\n\
         {html_body}\r\n",
        date = chrono::Utc::now().to_rfc2822(),
        id = uuid::Uuid::new_v4(),
    );

    if let Some(attachment) = attachment {
        message.push_str(&format!(
            "--{boundary}\r\n\
             Content-Type: {content_type}; name=\"{filename}\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             Content-Disposition: attachment; filename=\"{filename}\"\r\n\
             \r\n\
             {data}\r\n",
            content_type = attachment.content_type,
            filename = attachment.filename,
            data = wrap_base64(&attachment.data),
        ));
    }

    message.push_str(&format!("--{}--\r\n", boundary));
    message
}

fn tls_connector() -> anyhow::Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

fn server_name(host: &str) -> anyhow::Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|e| anyhow!("`{}` is not a valid TLS server name: {}", host, e))
}

pub struct Mailer {
    settings: EmailSettings,
}

impl Mailer {
    pub fn new(settings: EmailSettings) -> Self {
        Mailer { settings }
    }

    /// Host, sender and credentials all present.
    pub fn is_configured(&self) -> bool {
        let filled = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        filled(&self.settings.smtp_host)
            && filled(&self.settings.from)
            && filled(&self.settings.username)
            && filled(&self.settings.password)
    }

    /// Sends one message over STARTTLS; credentials never cross a plain
    /// connection. Skips with a warning when SMTP is not configured.
    pub async fn send_report(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        attachment: Option<Attachment>,
    ) -> anyhow::Result<()> {
        if !self.is_configured() {
            log::warn!("Email settings incomplete, not sending report to {}", recipient);
            return Ok(());
        }

        let host = self
            .settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| anyhow!("SMTP host is not configured"))?;
        let from = self
            .settings
            .from
            .as_deref()
            .ok_or_else(|| anyhow!("Sender address is not configured"))?;

        let boundary = format!("synapse-{}", uuid::Uuid::new_v4().simple());
        let message = build_message(
            from,
            recipient,
            subject,
            html_body,
            attachment.as_ref(),
            &boundary,
        );

        let envelope = Envelope::new(
            Some(from.parse::<EmailAddress>()?),
            vec![recipient.parse::<EmailAddress>()?],
        )?;

        let stream = TcpStream::connect((host, self.settings.smtp_port))
            .await
            .with_context(|| format!("Could not reach SMTP server {}:{}", host, self.settings.smtp_port))?;
        let transport = SmtpTransport::new(SmtpClient::new(), BufStream::new(stream)).await?;
        let stream = transport
            .starttls()
            .await
            .context("SMTP server refused STARTTLS")?
            .into_inner();

        let stream = tls_connector()?
            .connect(server_name(host)?, stream)
            .await
            .with_context(|| format!("TLS handshake with {} failed", host))?;
        let client = SmtpClient::new().without_greeting();
        let mut transport = SmtpTransport::new(client, BufStream::new(stream)).await?;

        if let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password) {
            let credentials = Credentials::new(username.clone(), password.clone());
            transport
                .try_login(&credentials, &[Mechanism::Plain, Mechanism::Login])
                .await?;
        }

        transport
            .send(SendableEmail::new(envelope, message))
            .await
            .context("SMTP server rejected the report")?;
        transport.quit().await?;

        log::info!("Report sent to {}", recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 587,
            username: Some("bot".to_string()),
            password: Some("secret".to_string()),
            from: Some("bot@example.com".to_string()),
        }
    }

    #[test]
    fn subject_names_count_and_target() {
        assert_eq!(
            report_subject(42, "https://x.org/jobs"),
            "Synapse AI Report: 42 Items from https://x.org/jobs"
        );
    }

    #[test]
    fn message_carries_html_and_base64_attachment() {
        let attachment = Attachment::csv(b"Title,Link\nCook,https://x.org/1\n".to_vec());

        let message = build_message(
            "bot@example.com",
            "ops@example.com",
            "Report",
            "<p>hi</p>",
            Some(&attachment),
            "BOUNDARY",
        );

        assert!(message.contains("Content-Type: multipart/mixed; boundary=\"BOUNDARY\""));
        assert!(message.contains("To: ops@example.com\r\n"));
        assert!(message.contains("<p>hi</p>"));
        assert!(message.contains("filename=\"extraction_data.csv\""));
        assert!(message.contains(&STANDARD.encode(&attachment.data)));
        assert!(message.ends_with("--BOUNDARY--\r\n"));
    }

    #[test]
    fn long_attachments_are_wrapped() {
        let wrapped = wrap_base64(&[7u8; 200]);
        assert!(wrapped.split("\r\n").all(|line| line.len() <= BASE64_LINE));
        assert_eq!(wrapped.replace("\r\n", ""), STANDARD.encode([7u8; 200]));
    }

    #[test]
    fn tls_targets_the_configured_host() {
        assert!(tls_connector().is_ok());
        assert!(server_name("smtp.example.com").is_ok());
        assert!(server_name("smtp example com").is_err());
    }

    #[tokio::test]
    async fn server_without_starttls_gets_no_credentials() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 plain.example ESMTP\r\n").await.unwrap();

            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                seen.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&seen).to_string();
                if text.ends_with("\r\n") {
                    let reply: &[u8] = match text.lines().last().unwrap_or("") {
                        l if l.starts_with("EHLO") => b"250-plain.example\r\n250 AUTH PLAIN LOGIN\r\n",
                        l if l.starts_with("STARTTLS") => b"502 5.5.1 Not implemented\r\n",
                        _ => b"221 Bye\r\n",
                    };
                    if socket.write_all(reply).await.is_err() {
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&seen).to_string()
        });

        let mut settings = settings();
        settings.smtp_host = Some("127.0.0.1".to_string());
        settings.smtp_port = port;

        let mailer = Mailer::new(settings);
        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            mailer.send_report("ops@example.com", "s", "b", None),
        )
        .await
        .unwrap();
        drop(mailer);

        assert!(sent.is_err());
        let conversation = server.await.unwrap();
        assert!(conversation.starts_with("EHLO"));
        assert!(!conversation.contains("AUTH"));
        assert!(!conversation.contains("MAIL FROM"));
    }

    #[test]
    fn missing_fields_mean_unconfigured() {
        assert!(Mailer::new(settings()).is_configured());

        let mut partial = settings();
        partial.password = Some(" ".to_string());
        assert!(!Mailer::new(partial).is_configured());

        let mut partial = settings();
        partial.smtp_host = None;
        assert!(!Mailer::new(partial).is_configured());
    }

    #[tokio::test]
    async fn unconfigured_mailer_skips_without_error() {
        let mailer = Mailer::new(EmailSettings {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            from: None,
        });

        assert!(mailer
            .send_report("ops@example.com", "s", "b", None)
            .await
            .is_ok());
    }
}
