//! Google Drive client against a mock Drive v3 API.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use concierge::config::IntegrationConfig;
use concierge::error::IntegrationError;
use concierge::integrations::{
    DriveClient, FileDescriptor, FileType, Integration, MimeClass, Operation, StorageUsage,
};

fn client(server: &MockServer) -> DriveClient {
    let config = IntegrationConfig {
        base_url: server.uri(),
        token: Some("ya29.test-token".to_string()),
        ..Default::default()
    };
    DriveClient::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_search_by_name_parses_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "name contains 'budget' and trashed=false"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {
                    "id": "s1",
                    "name": "Budget 2025",
                    "mimeType": "application/vnd.google-apps.spreadsheet",
                    "modifiedTime": "2025-09-01T10:00:00Z",
                    "webViewLink": "https://docs.google.com/spreadsheets/d/s1"
                },
                {
                    "id": "x1",
                    "name": "budget.xlsx",
                    "mimeType": "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                    "size": "2048"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::SearchFiles {
            query: "budget".to_string(),
            full_text: false,
            limit: 10,
        })
        .await
        .unwrap();
    let files: Vec<FileDescriptor> = serde_json::from_value(value).unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].mime_class, MimeClass::Sheet);
    assert_eq!(files[0].size_bytes, 0);
    assert!(files[0].modified_time.is_some());
    assert_eq!(files[1].mime_class, MimeClass::UnsupportedBinary);
    assert_eq!(files[1].size_bytes, 2048);
    assert_eq!(files[1].type_label(), "Excel File");
}

#[tokio::test]
async fn test_files_by_type_uses_mime_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageSize", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::FilesByType {
            file_type: FileType::Spreadsheet,
            limit: 5,
        })
        .await
        .unwrap();

    assert_eq!(value, json!([]));
}

#[tokio::test]
async fn test_export_native_doc_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/d1/export"))
        .and(query_param("mimeType", "text/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Roadmap\n- ship v2"))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::ExportFile {
            file_id: "d1".to_string(),
            mime_class: MimeClass::Doc,
        })
        .await
        .unwrap();

    assert_eq!(value["text"], "Roadmap\n- ship v2");
}

#[tokio::test]
async fn test_plain_text_is_downloaded_as_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/t1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_string("notes"))
        .expect(1)
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::ExportFile {
            file_id: "t1".to_string(),
            mime_class: MimeClass::PlainText,
        })
        .await
        .unwrap();

    assert_eq!(value["text"], "notes");
}

#[tokio::test]
async fn test_binary_export_is_refused_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let error = client(&server)
        .execute(&Operation::ExportFile {
            file_id: "p1".to_string(),
            mime_class: MimeClass::UnsupportedBinary,
        })
        .await
        .unwrap_err();

    assert!(matches!(error, IntegrationError::Unsupported { .. }));
}

#[tokio::test]
async fn test_rejected_token_maps_to_not_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": 401, "message": "Invalid Credentials" }
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .execute(&Operation::RecentFiles { limit: 10 })
        .await
        .unwrap_err();

    assert_eq!(
        error,
        IntegrationError::NotAuthenticated("Google Drive".to_string())
    );
}

#[tokio::test]
async fn test_api_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Rate limit exceeded" }
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .execute(&Operation::SharedFiles { limit: 10 })
        .await
        .unwrap_err();

    assert_eq!(
        error,
        IntegrationError::Api {
            status: 403,
            message: "Rate limit exceeded".to_string()
        }
    );
}

#[tokio::test]
async fn test_storage_usage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .and(query_param("fields", "storageQuota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "storageQuota": {
                "limit": "16106127360",
                "usage": "1610612736",
                "usageInDrive": "1073741824",
                "usageInDriveTrash": "10485760"
            }
        })))
        .mount(&server)
        .await;

    let value = client(&server)
        .execute(&Operation::StorageUsage)
        .await
        .unwrap();
    let usage: StorageUsage = serde_json::from_value(value).unwrap();

    assert_eq!(usage.limit, Some(16_106_127_360));
    assert_eq!(usage.usage_in_trash, 10_485_760);
    assert_eq!(usage.percent_used().map(|p| p.round()), Some(10.0));
}

#[tokio::test]
async fn test_operation_for_other_integration_is_unsupported() {
    let server = MockServer::start().await;

    let error = client(&server)
        .execute(&Operation::UnreadCount)
        .await
        .unwrap_err();

    assert!(matches!(error, IntegrationError::Unsupported { .. }));
}
