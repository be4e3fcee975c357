use serde_json::json;

use crate::common::{TestApp, png_bytes, routes};

const TOKEN_HEX_LEN: usize = 32;

mod upload_params {
    use super::*;

    #[tokio::test]
    async fn filename_with_extension_reserves_full_name() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "Hero.JPG"}), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let name = res.body["objectName"].as_str().unwrap();
        let (token_part, ext) = name.split_once('.').unwrap();
        assert_eq!(token_part.len(), TOKEN_HEX_LEN);
        assert_eq!(ext, "jpg");
        assert_eq!(res.body["url"], format!("/objects/{name}"));
        assert_eq!(
            res.body["uploadURL"],
            format!("/api/v1/objects/direct-upload/{name}")
        );
    }

    #[tokio::test]
    async fn missing_filename_reserves_a_bare_token() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({}), &token)
            .await;

        assert_eq!(res.status, 200);
        let name = res.body["objectName"].as_str().unwrap();
        assert_eq!(name.len(), TOKEN_HEX_LEN);
        assert!(res.body["url"].is_null());
    }

    #[tokio::test]
    async fn filename_with_path_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .post_with_token(
                routes::UPLOAD_PARAMS,
                &json!({"filename": "../etc/passwd"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn public_url_prefixes_returned_urls() {
        let app = TestApp::spawn_with(|config| {
            config.server.public_url = "https://shop.example.com".into();
        })
        .await;
        let token = app.login().await;

        let res = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "a.png"}), &token)
            .await;

        let name = res.body["objectName"].as_str().unwrap();
        assert_eq!(
            res.body["url"],
            format!("https://shop.example.com/objects/{name}")
        );
    }
}

mod direct_upload {
    use super::*;

    #[tokio::test]
    async fn reserved_name_round_trips() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let params = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "notes.txt"}), &token)
            .await;
        let name = params.body["objectName"].as_str().unwrap().to_string();

        let res = app
            .put_bytes_with_token(
                &routes::direct_upload(&name),
                b"spring catalogue".to_vec(),
                None,
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["objectName"], name.as_str());
        assert_eq!(res.body["location"], format!("/objects/{name}"));
        assert_eq!(res.body["url"], format!("/objects/{name}"));

        let (status, bytes) = app.get_bytes(&routes::serve(&name)).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, b"spring catalogue");
    }

    #[tokio::test]
    async fn bare_token_takes_extension_from_header_filename() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let params = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({}), &token)
            .await;
        let bare = params.body["objectName"].as_str().unwrap().to_string();

        let res = app
            .put_bytes_with_token(
                &routes::direct_upload(&bare),
                b"GIF89a-ish".to_vec(),
                Some("spinner.gif"),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["objectName"], format!("{bare}.gif"));
        assert_eq!(res.body["location"], format!("/objects/{bare}.gif"));
    }

    #[tokio::test]
    async fn bare_token_without_filename_is_sniffed() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let params = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({}), &token)
            .await;
        let bare = params.body["objectName"].as_str().unwrap().to_string();

        let res = app
            .put_bytes_with_token(&routes::direct_upload(&bare), png_bytes(8, 8), None, &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["objectName"], format!("{bare}.png"));
    }

    #[tokio::test]
    async fn second_upload_to_the_same_name_conflicts() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let params = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "a.txt"}), &token)
            .await;
        let name = params.body["objectName"].as_str().unwrap().to_string();
        let path = routes::direct_upload(&name);

        let first = app.put_bytes_with_token(&path, b"one".to_vec(), None, &token).await;
        assert_eq!(first.status, 200);

        let second = app.put_bytes_with_token(&path, b"two".to_vec(), None, &token).await;
        assert_eq!(second.status, 409);
        assert_eq!(second.body["code"], "CONFLICT");

        let (_, bytes) = app.get_bytes(&routes::serve(&name)).await;
        assert_eq!(bytes, b"one");
    }

    #[tokio::test]
    async fn malformed_name_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .put_bytes_with_token(
                &routes::direct_upload("not-a-token.png"),
                b"data".to_vec(),
                None,
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let params = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "a.png"}), &token)
            .await;
        let name = params.body["objectName"].as_str().unwrap().to_string();

        let res = app
            .put_bytes_with_token(&routes::direct_upload(&name), Vec::new(), None, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.get_bytes(&routes::serve(&name)).await.0, 404);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let params = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "big.bin"}), &token)
            .await;
        let name = params.body["objectName"].as_str().unwrap().to_string();

        let res = app
            .put_bytes_with_token(
                &routes::direct_upload(&name),
                vec![0u8; 300 * 1024],
                None,
                &token,
            )
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
    }
}

mod multipart_upload {
    use super::*;

    #[tokio::test]
    async fn upload_returns_canonical_location() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .upload_with_token("price-list.pdf", "application/pdf", b"%PDF-1.4".to_vec(), &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let name = res.body["objectName"].as_str().unwrap();
        assert!(name.ends_with(".pdf"));
        assert_eq!(res.body["path"], format!("/objects/{name}"));
        assert_eq!(res.body["size"], 8);
        assert_eq!(res.body["contentType"], "application/pdf");
    }

    #[tokio::test]
    async fn upload_is_byte_identical_on_fetch() {
        let app = TestApp::spawn().await;
        let token = app.login().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(50_000).collect();

        let name = app.upload(&token, "blob.bin", payload.clone()).await;

        let (status, bytes) = app.get_bytes(&routes::serve(&name)).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn wide_images_are_downsampled() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let name = app.upload(&token, "banner.png", png_bytes(400, 100)).await;

        let (_, bytes) = app.get_bytes(&routes::serve(&name)).await;
        let stored = image::load_from_memory(&bytes).unwrap();
        assert_eq!((stored.width(), stored.height()), (200, 50));
    }

    #[tokio::test]
    async fn small_images_are_untouched() {
        let app = TestApp::spawn().await;
        let token = app.login().await;
        let original = png_bytes(120, 80);

        let name = app.upload(&token, "icon.png", original.clone()).await;

        let (_, bytes) = app.get_bytes(&routes::serve(&name)).await;
        assert_eq!(bytes, original);
    }

    #[tokio::test]
    async fn undecodable_image_is_kept() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let name = app
            .upload(&token, "corrupt.jpg", b"\xFF\xD8\xFF garbage".to_vec())
            .await;

        let (status, bytes) = app.get_bytes(&routes::serve(&name)).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, b"\xFF\xD8\xFF garbage");
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let form = reqwest::multipart::Form::new().text("note", "no file here");
        let res = app
            .client
            .post(app.url(routes::OBJECTS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .upload_with_token(
                "huge.bin",
                "application/octet-stream",
                vec![1u8; 300 * 1024],
                &token,
            )
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn strict_policy_rejects_unknown_binaries() {
        let app = TestApp::spawn_with(|config| {
            config.storage.type_policy = media::TypePolicy::Strict;
        })
        .await;
        let token = app.login().await;

        let part = reqwest::multipart::Part::bytes(b"\x00\x01\x02\x03".to_vec());
        let form = reqwest::multipart::Form::new().part("file", part);
        let res = app
            .client
            .post(app.url(routes::OBJECTS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 415);
    }

    #[tokio::test]
    async fn upload_requires_admin() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_with_token("a.png", "image/png", png_bytes(4, 4), "bogus")
            .await;

        assert_eq!(res.status, 401);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn deleted_object_is_gone() {
        let app = TestApp::spawn().await;
        let token = app.login().await;
        let name = app.upload(&token, "old.txt", b"old".to_vec()).await;

        let res = app.delete_with_token(&routes::object(&name), &token).await;
        assert_eq!(res.status, 204);

        assert_eq!(app.get_bytes(&routes::serve(&name)).await.0, 404);

        let again = app.delete_with_token(&routes::object(&name), &token).await;
        assert_eq!(again.status, 404);
        assert_eq!(again.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_identifier_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app.delete_with_token(&routes::object("nope"), &token).await;
        assert_eq!(res.status, 404);
    }
}

mod resolve {
    use super::*;

    #[tokio::test]
    async fn references_are_canonicalized_in_order() {
        let app = TestApp::spawn().await;
        let token = app.login().await;

        let res = app
            .post_with_token(
                routes::RESOLVE,
                &json!({"references": [
                    "https://x/y.png",
                    "/objects/abc.png",
                    "abc.png",
                    "/api/objects/direct-upload/abc.png?x=1",
                    "  ",
                ]}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let resolved: Vec<_> = res.body["resolved"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["resolved"].clone())
            .collect();
        assert_eq!(
            resolved,
            vec![
                json!("https://x/y.png"),
                json!("/objects/abc.png"),
                json!("/objects/abc.png"),
                json!("/objects/abc.png"),
                json!(null),
            ]
        );
    }

    #[tokio::test]
    async fn too_many_references_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.login().await;
        let references: Vec<String> = (0..1001).map(|i| format!("{i}.png")).collect();

        let res = app
            .post_with_token(routes::RESOLVE, &json!({"references": references}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod purge {
    use super::*;

    #[tokio::test]
    async fn purge_is_best_effort() {
        let app = TestApp::spawn().await;
        let token = app.login().await;
        let first = app.upload(&token, "a.txt", b"a".to_vec()).await;
        let second = app.upload(&token, "b.txt", b"b".to_vec()).await;
        let never = "0123456789abcdef0123456789abcdef.png";

        let res = app
            .post_with_token(
                routes::PURGE,
                &json!({"references": [
                    format!("/objects/{first}"),
                    format!("/api/v1/objects/direct-upload/{second}"),
                    never,
                    "https://cdn.example.com/external.png",
                ]}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["removed"], json!([first, second]));
        assert_eq!(res.body["missing"], json!([never]));
        assert_eq!(
            res.body["skipped"],
            json!(["https://cdn.example.com/external.png"])
        );
        assert_eq!(res.body["failed"], json!([]));

        assert_eq!(app.get_bytes(&routes::serve(&first)).await.0, 404);
        assert_eq!(app.get_bytes(&routes::serve(&second)).await.0, 404);
    }
}

mod database_backend {
    use super::*;

    #[tokio::test]
    async fn upload_fetch_delete_round_trip() {
        let app = TestApp::spawn_on_database().await;
        let token = app.login().await;
        let png = png_bytes(32, 8);

        let name = app.upload(&token, "tile.png", png.clone()).await;
        let (status, bytes) = app.get_bytes(&routes::serve(&name)).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, png);

        let res = app.get_raw(&routes::serve(&name), &[]).await;
        assert_eq!(res.headers()["content-type"], "image/png");

        let res = app.delete_with_token(&routes::object(&name), &token).await;
        assert_eq!(res.status, 204);
        assert_eq!(app.get_bytes(&routes::serve(&name)).await.0, 404);
    }

    #[tokio::test]
    async fn direct_upload_conflicts_on_reuse() {
        let app = TestApp::spawn_on_database().await;
        let token = app.login().await;

        let res = app
            .post_with_token(routes::UPLOAD_PARAMS, &json!({"filename": "notes.txt"}), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let name = res.body["objectName"].as_str().unwrap().to_string();

        let first = app
            .put_bytes_with_token(&routes::direct_upload(&name), b"one".to_vec(), None, &token)
            .await;
        assert_eq!(first.status, 200, "{}", first.text);

        let second = app
            .put_bytes_with_token(&routes::direct_upload(&name), b"two".to_vec(), None, &token)
            .await;
        assert_eq!(second.status, 409);
        assert_eq!(app.get_bytes(&routes::serve(&name)).await.1, b"one");
    }
}
