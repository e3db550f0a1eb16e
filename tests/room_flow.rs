//! End-to-end room flows driven through the service layer on a paused clock.
//!
//! Push channels are plain in-memory channels registered in place of sockets, so every
//! message a player would see can be inspected in order.

use std::time::Duration;

use axum::extract::ws::Message;
use indexmap::IndexMap;
use market_rooms::{
    config::AppConfig,
    dto::rooms::{
        CreateRoomRequest, JoinRoomRequest, PlayerActionRequest, SubmitAllocationRequest,
    },
    error::ServiceError,
    services::{
        room_janitor,
        room_service::{self, PlayerSession},
        round_service,
        scoring::RoundTable,
    },
    state::{
        AppState, SharedState, hub::SUPERSEDED_CLOSE_CODE, registry::SharedRoom,
        room_code::RoomCode, state_machine::RoomPhase,
    },
};
use serde_json::Value;
use tokio::{sync::mpsc, time::sleep};
use uuid::Uuid;

const ROUND: Duration = Duration::from_secs(30);
const DWELL: Duration = Duration::from_secs(8);

fn test_state() -> SharedState {
    let mut config = AppConfig::default().with_rounds(vec![
        RoundTable::new("Chip boom", &[("NVDA", 20.0), ("SPY", 5.0)]),
        RoundTable::new("Pullback", &[("NVDA", -10.0), ("SPY", 2.0)]),
    ]);
    config.round_duration = ROUND;
    config.scoreboard_dwell = DWELL;
    AppState::new(config)
}

struct Client {
    id: Uuid,
    session: PlayerSession,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Client {
    /// Every JSON push received since the last call.
    fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if let Message::Text(text) = message {
                out.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        out
    }

    fn drain_types(&mut self) -> Vec<String> {
        self.drain()
            .iter()
            .map(|value| value["type"].as_str().unwrap().to_string())
            .collect()
    }
}

struct Lobby {
    state: SharedState,
    code: String,
    clients: Vec<Client>,
}

impl Lobby {
    /// A waiting room with `size` connected players, the first one hosting.
    async fn open(size: usize) -> Self {
        Self::open_in(test_state(), size).await
    }

    async fn open_in(state: SharedState, size: usize) -> Self {
        let created = room_service::create_room(
            &state,
            CreateRoomRequest {
                display_name: "P1".into(),
            },
        )
        .await
        .unwrap();
        let mut ids = vec![created.player_id];
        for index in 1..size {
            let joined = room_service::join_room(
                &state,
                JoinRoomRequest {
                    room_code: created.room_code.to_lowercase(),
                    display_name: format!("P{}", index + 1),
                },
            )
            .await
            .unwrap();
            ids.push(joined.player_id);
        }

        let mut clients = Vec::new();
        for id in ids {
            clients.push(connect(&state, &created.room_code, id).await);
        }
        for client in &mut clients {
            client.drain();
        }

        Self {
            state,
            code: created.room_code,
            clients,
        }
    }

    fn handle(&self) -> SharedRoom {
        let code = RoomCode::parse(&self.code).unwrap();
        self.state.rooms().get(&code).unwrap()
    }

    async fn phase(&self) -> RoomPhase {
        self.handle().lock().await.phase()
    }

    async fn start(&self) {
        room_service::start_game(
            &self.state,
            &self.code,
            PlayerActionRequest {
                player_id: self.clients[0].id.to_string(),
            },
        )
        .await
        .unwrap();
    }

    async fn submit(&self, index: usize, weights: &[(&str, f64)]) -> Result<(), ServiceError> {
        let allocations: IndexMap<String, f64> = weights
            .iter()
            .map(|(ticker, weight)| ((*ticker).to_string(), *weight))
            .collect();
        room_service::submit_allocation(
            &self.state,
            &self.code,
            SubmitAllocationRequest {
                player_id: self.clients[index].id.to_string(),
                allocations,
            },
        )
        .await
        .map(|_| ())
    }
}

async fn connect(state: &SharedState, code: &str, id: Uuid) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = room_service::connect_player(state, code, &id.to_string(), tx)
        .await
        .unwrap();
    Client { id, session, rx }
}

fn find<'a>(messages: &'a [Value], kind: &str) -> &'a Value {
    messages
        .iter()
        .find(|message| message["type"] == kind)
        .unwrap_or_else(|| panic!("no `{kind}` message in {messages:?}"))
}

#[tokio::test(start_paused = true)]
async fn full_submission_ends_round_without_waiting_for_timer() {
    let mut lobby = Lobby::open(2).await;
    lobby.start().await;
    assert_eq!(lobby.phase().await, RoomPhase::Playing);

    lobby.submit(0, &[("NVDA", 100.0)]).await.unwrap();
    lobby
        .submit(1, &[("NVDA", 0.0), ("SPY", 100.0)])
        .await
        .unwrap();
    assert_eq!(lobby.phase().await, RoomPhase::Scoreboard);

    let messages = lobby.clients[0].drain();
    let types: Vec<&str> = messages
        .iter()
        .map(|message| message["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        ["round_start", "player_submitted", "player_submitted", "round_end"]
    );

    let round_start = find(&messages, "round_start");
    assert_eq!(round_start["payload"]["current_round"], 1);
    assert_eq!(round_start["payload"]["timer_duration"], 30);

    let leaderboard = &find(&messages, "round_end")["payload"]["leaderboard"];
    assert_eq!(leaderboard[0]["player_id"], lobby.clients[0].id.to_string());
    assert_eq!(leaderboard[0]["rank"], 1);
    assert_eq!(leaderboard[0]["round_return"], 20.0);
    assert_eq!(leaderboard[1]["round_return"], 5.0);
    assert!(
        leaderboard[0]["total_score"].as_u64().unwrap()
            > leaderboard[1]["total_score"].as_u64().unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn deadline_scores_missing_players_as_cash() {
    let mut lobby = Lobby::open(2).await;
    lobby.start().await;
    lobby.submit(0, &[("NVDA", 100.0)]).await.unwrap();

    sleep(ROUND - Duration::from_secs(1)).await;
    assert_eq!(lobby.phase().await, RoomPhase::Playing);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(lobby.phase().await, RoomPhase::Scoreboard);

    let messages = lobby.clients[1].drain();
    let leaderboard = &find(&messages, "round_end")["payload"]["leaderboard"];
    let p1 = &leaderboard[0];
    let p2 = &leaderboard[1];
    assert_eq!(p1["player_id"], lobby.clients[0].id.to_string());
    assert_eq!(p1["round_return"], 20.0);
    assert_eq!(p1["total_score"], 1200);
    assert_eq!(p2["player_id"], lobby.clients[1].id.to_string());
    assert_eq!(p2["round_return"], 0.0);
    assert_eq!(p2["round_score"], 1000);
}

#[tokio::test(start_paused = true)]
async fn late_timers_are_no_ops() {
    let mut lobby = Lobby::open(2).await;
    lobby.start().await;
    lobby.submit(0, &[("NVDA", 100.0)]).await.unwrap();
    lobby.submit(1, &[("SPY", 100.0)]).await.unwrap();

    let handle = lobby.handle();
    assert!(!round_service::expire_round(&lobby.state, &handle, 1).await);

    let scores: Vec<u64> = handle
        .lock()
        .await
        .players()
        .iter()
        .map(|player| player.cumulative_score)
        .collect();
    assert_eq!(scores, vec![1200, 1050]);

    // The original deadline passing changes nothing either.
    sleep(ROUND + Duration::from_secs(1)).await;
    let rescored: Vec<u64> = handle
        .lock()
        .await
        .players()
        .iter()
        .map(|player| player.cumulative_score)
        .collect();
    assert_eq!(rescored, scores);

    // Scoreboard of round 1 is over by now; a second advance is ignored.
    assert!(
        round_service::finish_scoreboard(&lobby.state, &handle, 1)
            .await
            .is_none()
    );
    let round_ends = lobby.clients[0]
        .drain_types()
        .into_iter()
        .filter(|kind| kind == "round_end")
        .count();
    assert_eq!(round_ends, 1);
}

#[tokio::test(start_paused = true)]
async fn rounds_follow_in_order_until_game_complete() {
    let mut lobby = Lobby::open(2).await;
    lobby.start().await;
    lobby.submit(0, &[("NVDA", 100.0)]).await.unwrap();
    lobby.submit(1, &[("SPY", 100.0)]).await.unwrap();

    sleep(DWELL + Duration::from_millis(10)).await;
    assert_eq!(lobby.phase().await, RoomPhase::Playing);
    assert_eq!(lobby.handle().lock().await.current_round(), 2);

    // Nobody submits in round 2; timer and dwell drive the room to completion.
    sleep(ROUND + DWELL + Duration::from_secs(1)).await;
    assert_eq!(lobby.phase().await, RoomPhase::Complete);

    for client in &mut lobby.clients {
        let messages = client.drain();
        let sequence: Vec<(String, Option<u64>)> = messages
            .iter()
            .filter(|message| message["type"] != "player_submitted")
            .map(|message| {
                let round = message["payload"]["current_round"]
                    .as_u64()
                    .or_else(|| message["payload"]["round"].as_u64());
                (message["type"].as_str().unwrap().to_string(), round)
            })
            .collect();
        assert_eq!(
            sequence,
            vec![
                ("round_start".to_string(), Some(1)),
                ("round_end".to_string(), Some(1)),
                ("round_start".to_string(), Some(2)),
                ("round_end".to_string(), Some(2)),
                ("game_complete".to_string(), None),
            ]
        );
        let standings = &find(&messages, "game_complete")["payload"]["final_leaderboard"];
        assert_eq!(standings.as_array().unwrap().len(), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn joining_after_start_is_rejected() {
    let lobby = Lobby::open(2).await;
    lobby.start().await;

    let result = room_service::join_room(
        &lobby.state,
        JoinRoomRequest {
            room_code: lobby.code.clone(),
            display_name: "Late".into(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::GameAlreadyStarted)));
}

#[tokio::test(start_paused = true)]
async fn allocations_off_by_one_are_rejected() {
    let lobby = Lobby::open(2).await;
    lobby.start().await;

    for weights in [
        &[("NVDA", 99.0)][..],
        &[("NVDA", 50.0), ("SPY", 51.0)][..],
        &[("NVDA", 110.0), ("SPY", -10.0)][..],
        &[("TSLA", 100.0)][..],
    ] {
        assert!(matches!(
            lobby.submit(0, weights).await,
            Err(ServiceError::InvalidAllocation(_))
        ));
    }
    assert_eq!(lobby.handle().lock().await.submitted_count(), 0);

    lobby.submit(0, &[("nvda", 60.0), ("SPY", 40.0)]).await.unwrap();
    assert!(matches!(
        lobby.submit(0, &[("SPY", 100.0)]).await,
        Err(ServiceError::AlreadySubmitted)
    ));
}

#[tokio::test(start_paused = true)]
async fn start_requires_host_and_enough_players() {
    let solo = Lobby::open(1).await;
    let result = room_service::start_game(
        &solo.state,
        &solo.code,
        PlayerActionRequest {
            player_id: solo.clients[0].id.to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::InsufficientPlayers(2))));

    let lobby = Lobby::open(2).await;
    let result = room_service::start_game(
        &lobby.state,
        &lobby.code,
        PlayerActionRequest {
            player_id: lobby.clients[1].id.to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::NotHost)));

    let result = room_service::start_game(
        &lobby.state,
        "ZZZZZZ",
        PlayerActionRequest {
            player_id: lobby.clients[0].id.to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::RoomNotFound)));
}

#[tokio::test(start_paused = true)]
async fn host_disconnect_hands_role_to_earliest_connected_player() {
    let mut lobby = Lobby::open(3).await;
    let host = lobby.clients.remove(0);

    room_service::disconnect_player(&lobby.state, &host.session).await;

    let handle = lobby.handle();
    let room = handle.lock().await;
    assert_eq!(room.host_id(), lobby.clients[0].id);
    assert_eq!(
        room.players()
            .iter()
            .filter(|player| player.id == room.host_id())
            .count(),
        1
    );
    assert!(!room.player(&host.id).unwrap().connected);
    drop(room);

    let new_host_id = lobby.clients[0].id;
    for client in &mut lobby.clients {
        let messages = client.drain();
        let left = find(&messages, "player_left");
        assert_eq!(left["payload"]["player_id"], host.id.to_string());
        assert_eq!(left["payload"]["host_id"], new_host_id.to_string());
    }
}

#[tokio::test(start_paused = true)]
async fn reconnecting_player_receives_snapshot() {
    let mut lobby = Lobby::open(2).await;
    lobby.start().await;
    lobby.submit(1, &[("SPY", 100.0)]).await.unwrap();

    let dropped = lobby.clients.remove(1);
    room_service::disconnect_player(&lobby.state, &dropped.session).await;
    assert_eq!(lobby.phase().await, RoomPhase::Playing);

    sleep(Duration::from_secs(10)).await;
    let mut back = connect(&lobby.state, &lobby.code, dropped.id).await;
    let messages = back.drain();
    assert_eq!(messages[0]["type"], "room_snapshot");
    let snapshot = &messages[0]["payload"];
    assert_eq!(snapshot["phase"], "playing");
    assert_eq!(snapshot["current_round"], 1);
    assert_eq!(snapshot["total_rounds"], 2);
    assert_eq!(snapshot["has_submitted"], true);
    assert_eq!(snapshot["submitted_count"], 1);
    assert_eq!(snapshot["seconds_remaining"], 20);
    assert_eq!(snapshot["players"].as_array().unwrap().len(), 2);

    let types = lobby.clients[0].drain_types();
    assert!(types.contains(&"player_left".to_string()));
    assert!(types.contains(&"player_reconnected".to_string()));
}

#[tokio::test(start_paused = true)]
async fn newer_connection_supersedes_older_one() {
    let mut lobby = Lobby::open(2).await;
    let host_id = lobby.clients[0].id;

    let mut second = connect(&lobby.state, &lobby.code, host_id).await;
    let old = &mut lobby.clients[0];
    assert!(matches!(
        old.rx.try_recv(),
        Ok(Message::Close(Some(frame))) if frame.code == SUPERSEDED_CLOSE_CODE
    ));
    assert_eq!(second.drain()[0]["type"], "room_snapshot");

    // The old socket winding down must not mark the player offline.
    room_service::disconnect_player(&lobby.state, &old.session).await;
    let handle = lobby.handle();
    assert!(handle.lock().await.player(&host_id).unwrap().connected);
    assert!(lobby.clients[1].drain_types().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_room_or_player_cannot_connect() {
    let lobby = Lobby::open(2).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let result =
        room_service::connect_player(&lobby.state, &lobby.code, &Uuid::new_v4().to_string(), tx)
            .await;
    assert!(matches!(result, Err(ServiceError::NotInRoom)));

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = room_service::connect_player(
        &lobby.state,
        "QQQQQQ",
        &lobby.clients[0].id.to_string(),
        tx,
    )
    .await;
    assert!(matches!(result, Err(ServiceError::RoomNotFound)));
}

#[tokio::test(start_paused = true)]
async fn leaving_the_lobby_removes_player_and_reassigns_host() {
    let mut lobby = Lobby::open(3).await;
    let host_id = lobby.clients[0].id;

    room_service::leave_room(
        &lobby.state,
        &lobby.code,
        PlayerActionRequest {
            player_id: host_id.to_string(),
        },
    )
    .await
    .unwrap();

    let handle = lobby.handle();
    {
        let room = handle.lock().await;
        assert_eq!(room.players().len(), 2);
        assert_eq!(room.host_id(), lobby.clients[1].id);
    }
    assert!(matches!(
        lobby.clients[0].rx.try_recv(),
        Ok(Message::Close(None))
    ));
    let messages = lobby.clients[2].drain();
    assert_eq!(
        find(&messages, "player_left")["payload"]["host_id"],
        lobby.clients[1].id.to_string()
    );
}

#[tokio::test(start_paused = true)]
async fn empty_lobby_is_evicted_when_last_player_disconnects() {
    let mut lobby = Lobby::open(2).await;
    let code = RoomCode::parse(&lobby.code).unwrap();

    let second = lobby.clients.remove(1);
    room_service::disconnect_player(&lobby.state, &second.session).await;
    assert!(lobby.state.rooms().get(&code).is_some());

    let first = lobby.clients.remove(0);
    room_service::disconnect_player(&lobby.state, &first.session).await;
    assert!(lobby.state.rooms().get(&code).is_none());
}

#[tokio::test(start_paused = true)]
async fn janitor_evicts_completed_rooms_after_grace_period() {
    let mut lobby = Lobby::open(2).await;
    lobby.start().await;
    sleep((ROUND + DWELL) * 2 + Duration::from_secs(1)).await;
    assert_eq!(lobby.phase().await, RoomPhase::Complete);

    assert_eq!(room_janitor::sweep(&lobby.state).await, 0);

    let grace = lobby.state.config().completed_grace;
    sleep(grace).await;
    assert_eq!(room_janitor::sweep(&lobby.state).await, 1);
    assert_eq!(lobby.state.rooms().len(), 0);

    let closed = std::iter::from_fn(|| lobby.clients[0].rx.try_recv().ok())
        .any(|message| matches!(message, Message::Close(None)));
    assert!(closed);
}

#[tokio::test(start_paused = true)]
async fn lobby_waits_for_players_who_have_not_connected_yet() {
    let state = test_state();
    let created = room_service::create_room(
        &state,
        CreateRoomRequest {
            display_name: "P1".into(),
        },
    )
    .await
    .unwrap();
    let host = connect(&state, &created.room_code, created.player_id).await;
    let joined = room_service::join_room(
        &state,
        JoinRoomRequest {
            room_code: created.room_code.clone(),
            display_name: "P2".into(),
        },
    )
    .await
    .unwrap();

    room_service::disconnect_player(&state, &host.session).await;
    let code = RoomCode::parse(&created.room_code).unwrap();
    assert!(state.rooms().get(&code).is_some());

    let mut late = connect(&state, &created.room_code, joined.player_id).await;
    assert_eq!(late.drain_types(), vec!["room_snapshot"]);
}

#[tokio::test(start_paused = true)]
async fn janitor_evicts_rooms_idle_without_connections() {
    let state = test_state();
    let created = room_service::create_room(
        &state,
        CreateRoomRequest {
            display_name: "P1".into(),
        },
    )
    .await
    .unwrap();
    room_service::join_room(
        &state,
        JoinRoomRequest {
            room_code: created.room_code.clone(),
            display_name: "P2".into(),
        },
    )
    .await
    .unwrap();

    let idle = state.config().idle_timeout;
    sleep(idle - Duration::from_secs(1)).await;
    assert_eq!(room_janitor::sweep(&state).await, 0);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(room_janitor::sweep(&state).await, 1);
    assert!(state.rooms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn janitor_evicts_rooms_past_maximum_age_even_when_connected() {
    let mut config = test_state().config().clone();
    config.max_room_age = Duration::from_secs(600);
    let mut lobby = Lobby::open_in(AppState::new(config), 2).await;

    sleep(Duration::from_secs(599)).await;
    assert_eq!(room_janitor::sweep(&lobby.state).await, 0);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(room_janitor::sweep(&lobby.state).await, 1);
    assert_eq!(lobby.state.rooms().len(), 0);

    let closed = std::iter::from_fn(|| lobby.clients[1].rx.try_recv().ok())
        .any(|message| matches!(message, Message::Close(None)));
    assert!(closed);
}
