//! Torii SQL endpoint served from canned rows, for exercising the HTTP-backed clients.
//!
//! A query is answered by the most recently added rule whose fragment it contains.
//! Anything else gets a 400 with a `no such table` error, which is what Torii answers for
//! models that were never written.

use crate::indexer::sql::SqlClient;
use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    web,
};
use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use std::{
    net::TcpListener,
    sync::{
        Arc,
        Mutex,
    },
    thread::JoinHandle,
};

#[derive(Debug, Default)]
struct State {
    rules: Vec<(String, Value)>,
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SqlParams {
    query: String,
}

pub struct MockTorii {
    state: Arc<Mutex<State>>,
    base_url: String,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl MockTorii {
    pub fn start() -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let server_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(server_state.clone()))
                .route("/sql", web::get().to(handle_sql))
        })
        .workers(1)
        .shutdown_timeout(1)
        .listen(listener)
        .unwrap()
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            state,
            base_url,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    pub fn sql(&self) -> SqlClient {
        SqlClient::new(&self.base_url).unwrap()
    }

    /// Answers queries containing `fragment` with `rows`, replacing an earlier answer.
    pub fn respond(&self, fragment: &str, rows: Value) {
        let mut state = self.state.lock().unwrap();
        state.rules.retain(|(existing, _)| existing != fragment);
        state.rules.push((fragment.to_string(), rows));
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }
}

async fn handle_sql(
    state: web::Data<Arc<Mutex<State>>>,
    params: web::Query<SqlParams>,
) -> HttpResponse {
    let mut state = state.lock().unwrap();
    state.queries.push(params.query.clone());
    let rows = state
        .rules
        .iter()
        .rev()
        .find(|(fragment, _)| params.query.contains(fragment.as_str()))
        .map(|(_, rows)| rows.clone());
    match rows {
        Some(rows) => HttpResponse::Ok().json(rows),
        None => HttpResponse::BadRequest().json(json!({ "error": "no such table" })),
    }
}

impl Drop for MockTorii {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(false);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}
