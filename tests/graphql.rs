// End-to-end tests for the posts and users GraphQL schemas
// These execute operations against in-process schemas, covering the same
// resolver and subscription paths the HTTP/WebSocket transports terminate

use std::sync::Arc;
use std::time::Duration;

use async_graphql::{Request, Variables};
use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;

use microblog::{
    create_posts_schema, create_users_schema, EventBus, InMemoryPostStorage, InMemoryUserStorage,
    Post, PostStorage, PostsSchema, UserStorage, UsersSchema, POST_ADDED, POST_DELETED,
};

fn posts_setup() -> (PostsSchema, Arc<InMemoryPostStorage>, EventBus<Post>) {
    let storage = Arc::new(InMemoryPostStorage::new());
    let bus: EventBus<Post> = EventBus::new();
    let schema = create_posts_schema(storage.clone() as Arc<dyn PostStorage>, bus.clone());
    (schema, storage, bus)
}

fn users_setup() -> (UsersSchema, Arc<InMemoryUserStorage>) {
    let storage = Arc::new(InMemoryUserStorage::new());
    let schema = create_users_schema(storage.clone() as Arc<dyn UserStorage>);
    (schema, storage)
}

fn error_code(error: &async_graphql::ServerError) -> Option<String> {
    let serialized = serde_json::to_value(error).ok()?;
    serialized
        .get("extensions")?
        .get("code")?
        .as_str()
        .map(str::to_string)
}

#[tokio::test]
async fn create_post_round_trips_through_query() {
    let (schema, _storage, _bus) = posts_setup();

    let response = schema
        .execute(r#"mutation { createPost(title: "A", content: "B", userId: 1) { id title content userId } }"#)
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let data = response.data.into_json().unwrap();
    let created = &data["createPost"];
    assert!(!created["id"].is_null());
    assert_eq!(created["title"], "A");
    assert_eq!(created["content"], "B");
    assert_eq!(created["userId"], 1);

    let response = schema
        .execute("query { posts { id title content userId } }")
        .await;
    assert!(response.errors.is_empty());
    let data = response.data.into_json().unwrap();
    assert_eq!(data["posts"].as_array().unwrap().len(), 1);
    assert_eq!(data["posts"][0], *created);
}

#[tokio::test]
async fn create_post_accepts_variables() {
    let (schema, _storage, _bus) = posts_setup();

    let request = Request::new(
        "mutation Create($title: String!, $content: String!, $userId: Int!) {
            createPost(title: $title, content: $content, userId: $userId) { title userId }
        }",
    )
    .variables(Variables::from_json(json!({
        "title": "From variables",
        "content": "body",
        "userId": 3,
    })));

    let response = schema.execute(request).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["createPost"]["title"], "From variables");
    assert_eq!(data["createPost"]["userId"], 3);
}

#[tokio::test]
async fn post_added_subscriber_receives_exactly_the_created_post() {
    let (schema, _storage, _bus) = posts_setup();

    let mut stream = Box::pin(
        schema.execute_stream("subscription { postAdded { id title content userId } }"),
    );

    let mutation_schema = schema.clone();
    let mutation = tokio::spawn(async move {
        // Give the subscription stream time to register its listener
        tokio::time::sleep(Duration::from_millis(100)).await;
        mutation_schema
            .execute(r#"mutation { createPost(title: "X", content: "Y", userId: 2) { id title content userId } }"#)
            .await
    });

    let event = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("no subscription event arrived")
        .expect("subscription stream ended");
    assert!(event.errors.is_empty(), "{:?}", event.errors);

    let mutation_response = mutation.await.unwrap();
    assert!(mutation_response.errors.is_empty());

    // The streamed payload equals the mutation's own response
    let streamed = event.data.into_json().unwrap();
    let created = mutation_response.data.into_json().unwrap();
    assert_eq!(streamed["postAdded"], created["createPost"]);
    assert_eq!(streamed["postAdded"]["title"], "X");

    // Exactly one message: nothing else is pending
    assert!(timeout(Duration::from_millis(100), stream.next())
        .await
        .is_err());
}

#[tokio::test]
async fn post_deleted_subscriber_receives_the_deleted_post() {
    let (schema, storage, _bus) = posts_setup();

    let created = storage
        .create_post(microblog::models::NewPost {
            title: "Doomed".to_string(),
            content: "soon gone".to_string(),
            user_id: 1,
        })
        .await
        .unwrap();

    let mut stream = Box::pin(schema.execute_stream("subscription { postDeleted { id title } }"));

    let mutation_schema = schema.clone();
    let id = created.id;
    let mutation = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        mutation_schema
            .execute(format!(r#"mutation {{ deletePost(id: "{}") {{ id }} }}"#, id).as_str())
            .await
    });

    let event = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("no subscription event arrived")
        .expect("subscription stream ended");
    assert!(event.errors.is_empty(), "{:?}", event.errors);

    let streamed = event.data.into_json().unwrap();
    assert_eq!(streamed["postDeleted"]["title"], "Doomed");

    assert!(mutation.await.unwrap().errors.is_empty());
}

#[tokio::test]
async fn delete_of_missing_post_is_not_found_and_publishes_nothing() {
    let (schema, _storage, bus) = posts_setup();

    let mut deleted_events = bus.subscribe(POST_DELETED);

    let response = schema
        .execute(r#"mutation { deletePost(id: "999") { id } }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("Post not found"));
    assert_eq!(error_code(&response.errors[0]).as_deref(), Some("NOT_FOUND"));

    // No postDeleted event was published for the failed delete
    assert!(timeout(Duration::from_millis(100), deleted_events.next())
        .await
        .is_err());
}

#[tokio::test]
async fn update_of_missing_post_is_not_found() {
    let (schema, _storage, _bus) = posts_setup();

    let response = schema
        .execute(r#"mutation { updatePost(id: "42", title: "new") { id } }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(error_code(&response.errors[0]).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn non_numeric_user_id_fails_coercion_before_any_write() {
    let (schema, storage, _bus) = posts_setup();

    let response = schema
        .execute(r#"mutation { createPost(title: "X", content: "Y", userId: "abc") { id } }"#)
        .await;
    assert!(!response.errors.is_empty());

    // Coercion failed before the resolver ran: no partial post exists
    assert!(storage.list_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_numeric_id_argument_is_invalid_input() {
    let (schema, _storage, _bus) = posts_setup();

    let response = schema
        .execute(r#"mutation { deletePost(id: "abc") { id } }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        error_code(&response.errors[0]).as_deref(),
        Some("INVALID_INPUT")
    );
}

#[tokio::test]
async fn dropped_subscription_deregisters_its_listener() {
    let (schema, _storage, bus) = posts_setup();

    let mut stream = Box::pin(schema.execute_stream("subscription { postAdded { id } }"));

    // First poll registers the listener
    assert!(timeout(Duration::from_millis(100), stream.next())
        .await
        .is_err());
    assert_eq!(bus.listener_count(POST_ADDED), 1);

    drop(stream);
    assert_eq!(bus.listener_count(POST_ADDED), 0);

    // Publishing after the disconnect neither errors nor delivers anywhere
    let response = schema
        .execute(r#"mutation { createPost(title: "X", content: "Y", userId: 2) { id } }"#)
        .await;
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn user_crud_round_trip() {
    let (schema, _storage) = users_setup();

    let response = schema
        .execute(r#"mutation { createUser(name: "Ada", email: "ada@example.com") { id name email } }"#)
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    let id = data["createUser"]["id"].as_str().unwrap().to_string();
    assert_eq!(data["createUser"]["name"], "Ada");

    let response = schema
        .execute(format!(r#"query {{ user(id: "{}") {{ name email }} }}"#, id).as_str())
        .await;
    assert!(response.errors.is_empty());
    let data = response.data.into_json().unwrap();
    assert_eq!(data["user"]["email"], "ada@example.com");

    let response = schema
        .execute(
            format!(
                r#"mutation {{ updateUser(id: "{}", email: "ada@lovelace.dev") {{ name email }} }}"#,
                id
            )
            .as_str(),
        )
        .await;
    assert!(response.errors.is_empty());
    let data = response.data.into_json().unwrap();
    assert_eq!(data["updateUser"]["name"], "Ada");
    assert_eq!(data["updateUser"]["email"], "ada@lovelace.dev");

    let response = schema
        .execute(format!(r#"mutation {{ deleteUser(id: "{}") {{ id }} }}"#, id).as_str())
        .await;
    assert!(response.errors.is_empty());

    let response = schema.execute("query { users { id } }").await;
    let data = response.data.into_json().unwrap();
    assert!(data["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_user_lookups_and_mutations() {
    let (schema, _storage) = users_setup();

    // Lookup of a missing user is null data, not an error
    let response = schema.execute(r#"query { user(id: "7") { name } }"#).await;
    assert!(response.errors.is_empty());
    let data = response.data.into_json().unwrap();
    assert!(data["user"].is_null());

    // Mutations targeting a missing user are NotFound errors
    let response = schema
        .execute(r#"mutation { deleteUser(id: "7") { id } }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(error_code(&response.errors[0]).as_deref(), Some("NOT_FOUND"));

    let response = schema
        .execute(r#"mutation { updateUser(id: "7", name: "x") { id } }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(error_code(&response.errors[0]).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn unknown_field_is_a_validation_error() {
    let (schema, _storage, _bus) = posts_setup();

    let response = schema.execute("query { nonsense }").await;
    assert!(!response.errors.is_empty());
}
