use bytes::BytesMut;
use tokio_util::codec::Encoder;
use wiretrace::{
    analyzer::Analyzer,
    codec,
    error::Error,
    extensions::{Extended, MetadataMsg},
    observer::SessionObserver,
    reassembler::Verdict,
    session::{PeerCtx, Session},
    store::DescriptorStore,
    types::InfoHash,
    wire::{Block, BlockInfo, Core, CoreCodec, ExtendedMessage, Handshake},
};

#[derive(Default)]
struct Events {
    handshakes: usize,
    messages: Vec<Core>,
    extended: Vec<Extended>,
}

impl SessionObserver for Events {
    fn on_handshake(&mut self, _handshake: &Handshake) {
        self.handshakes += 1;
    }

    fn on_message(&mut self, _ctx: &PeerCtx, msg: &Core) {
        self.messages.push(msg.clone());
    }

    fn on_extended_message(&mut self, _ctx: &PeerCtx, msg: &Extended) {
        self.extended.push(msg.clone());
    }
}

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .compact()
        .without_time()
        .with_test_writer()
        .try_init();
}

fn stream(info_hash: [u8; 20], msgs: Vec<Core>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    let handshake = Handshake::new(info_hash, *b"-WT0100-abcdefghijkl");
    buf.extend_from_slice(&handshake.serialize());
    for msg in msgs {
        CoreCodec.encode(msg, &mut buf).unwrap();
    }
    buf.to_vec()
}

fn ext(id: u8, payload: &[u8]) -> Core {
    Core::Extended(ExtendedMessage::new(id, payload))
}

fn piece(index: u32, begin: u32, data: &[u8]) -> Core {
    Core::Piece(Block { index, begin, block: data.to_vec() })
}

/// A single file torrent, keys in bencode order.
fn torrent(piece_length: u64, length: u64, pieces: &[u8]) -> Vec<u8> {
    let mut buf = b"d4:infod".to_vec();
    buf.extend(format!("6:lengthi{length}e4:name3:out").bytes());
    buf.extend(format!("12:piece lengthi{piece_length}e").bytes());
    buf.extend(format!("6:pieces{}:", pieces.len()).bytes());
    buf.extend_from_slice(pieces);
    buf.extend(b"ee");
    buf
}

fn parse(buf: &[u8]) -> (Session, Events, Result<(), Error>) {
    let mut session = Session::new();
    let mut events = Events::default();
    let result = session.parse(buf, &mut events);
    (session, events, result)
}

#[test]
fn capital_p_protocol_is_invalid() {
    let mut buf = stream([0; 20], vec![Core::Have(1)]);
    buf[12] = b'P';

    let (session, events, result) = parse(&buf);

    assert!(matches!(result, Err(Error::InvalidStream(_))));
    assert_eq!(events.handshakes, 0);
    assert_eq!(session.ctx, None);
}

#[test]
fn two_have_messages_in_order() {
    let buf = stream([4; 20], vec![Core::Have(3), Core::Have(7)]);

    let (session, events, result) = parse(&buf);

    result.unwrap();
    assert_eq!(events.handshakes, 1);
    assert_eq!(events.messages, vec![Core::Have(3), Core::Have(7)]);
    assert_eq!(session.ctx.unwrap().info_hash, InfoHash([4; 20]));
    assert_eq!(session.ctx.unwrap().peer_id.client(), Some("WT0100"));
}

#[test]
fn every_message_kind() {
    let msgs = vec![
        Core::Choke,
        Core::Unchoke,
        Core::Interested,
        Core::NotInterested,
        Core::Have(1),
        Core::Bitfield(wiretrace::wire::Bitfield::from_slice(&[0b1010_0000])),
        Core::Request(BlockInfo { index: 1, begin: 2, len: 3 }),
        piece(1, 2, &[1, 2, 3]),
        Core::Cancel(BlockInfo { index: 1, begin: 2, len: 3 }),
        Core::Port(6881),
        Core::SuggestPiece(4),
        Core::HaveAll,
        Core::HaveNone,
        Core::Reject(BlockInfo { index: 1, begin: 2, len: 3 }),
        Core::AllowedFast(5),
    ];
    let buf = stream([0; 20], msgs.clone());

    let (session, events, result) = parse(&buf);

    result.unwrap();
    assert_eq!(events.messages, msgs);
    assert_eq!(session.messages, msgs.len());
    assert_eq!(session.piece_bytes, 3);
}

#[test]
fn truncation_at_any_offset() {
    let msgs = vec![Core::Have(3), piece(0, 0, &[9; 12]), Core::Interested];
    let buf = stream([0; 20], msgs.clone());

    // offsets where a message ends
    let ends = [68, 68 + 9, 68 + 9 + 25, 68 + 9 + 25 + 5];
    assert_eq!(buf.len(), ends[3]);

    for cut in 68..=buf.len() {
        let (_, events, result) = parse(&buf[..cut]);
        let complete = ends.iter().filter(|end| **end <= cut).count() - 1;

        if ends.contains(&cut) {
            result.unwrap();
        } else {
            assert!(
                matches!(result, Err(Error::UnexpectedEndOfStream)),
                "cut at {cut}"
            );
        }
        assert_eq!(events.messages, msgs[..complete].to_vec(), "cut at {cut}");
    }

    for cut in 0..68 {
        let (_, events, result) = parse(&buf[..cut]);
        assert!(matches!(result, Err(Error::UnexpectedEndOfStream)));
        assert_eq!(events.handshakes, 0);
    }
}

#[test]
fn keep_alives_anywhere() {
    let with = stream(
        [0; 20],
        vec![
            Core::KeepAlive,
            Core::Have(1),
            Core::KeepAlive,
            Core::KeepAlive,
            Core::Have(2),
            Core::KeepAlive,
        ],
    );
    let without = stream([0; 20], vec![Core::Have(1), Core::Have(2)]);
    assert_eq!(with.len(), without.len() + 4 * 4);

    let (s1, e1, r1) = parse(&with);
    let (s2, e2, r2) = parse(&without);

    r1.unwrap();
    r2.unwrap();
    assert_eq!(e1.messages, e2.messages);
    assert_eq!(s1.messages, s2.messages);
}

#[test]
fn length_past_the_end_is_fatal() {
    let mut buf = stream([0; 20], vec![Core::Have(1)]);
    buf.extend_from_slice(&[0, 0, 0x40, 0x09, 7, 0, 0, 0, 0]);

    let (_, events, result) = parse(&buf);

    assert!(matches!(result, Err(Error::UnexpectedEndOfStream)));
    assert_eq!(events.messages, vec![Core::Have(1)]);
}

#[test]
fn reassembly_and_verification_across_blocks() {
    init_logs();

    let data: Vec<u8> = (10..18).collect();
    let mut store = DescriptorStore::new();
    let info_hash =
        store.insert_torrent(&torrent(8, 8, &codec::sha1(&data))).unwrap();

    let buf = stream(
        info_hash.0,
        vec![piece(0, 4, &data[4..]), piece(0, 0, &data[..4])],
    );

    let mut analyzer = Analyzer::new(store);
    analyzer.reassembler_mut().set_keep_completed(true);
    let report = analyzer.parse_stream("scenario", &buf);

    assert!(report.is_complete());
    assert_eq!(report.piece_bytes, 8);
    assert_eq!(report.stream_len, buf.len());

    let done = analyzer.reassembler_mut().take_completed();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].data, data);
    assert_eq!(done[0].verdict, Verdict::Match);
    assert_eq!(analyzer.reassembler().stats().matched, 1);
    assert_eq!(analyzer.reassembler().pending(), 0);
}

#[test]
fn single_bit_difference_is_a_mismatch() {
    let data: Vec<u8> = (10..18).collect();
    let mut store = DescriptorStore::new();
    let info_hash =
        store.insert_torrent(&torrent(8, 8, &codec::sha1(&data))).unwrap();

    let mut flipped = data.clone();
    flipped[5] ^= 0x01;
    let buf = stream(info_hash.0, vec![piece(0, 0, &flipped)]);

    let mut analyzer = Analyzer::new(store);
    analyzer.parse_stream("flipped", &buf);

    let stats = analyzer.reassembler().stats();
    assert_eq!(stats.mismatched, 1);
    assert_eq!(stats.matched, 0);
}

#[test]
fn pieces_complete_across_streams() {
    let data: Vec<u8> = (0..8).collect();
    let mut store = DescriptorStore::new();
    let info_hash =
        store.insert_torrent(&torrent(8, 8, &codec::sha1(&data))).unwrap();

    let first = stream(info_hash.0, vec![piece(0, 0, &data[..4])]);
    let second = stream(info_hash.0, vec![piece(0, 4, &data[4..])]);

    let mut analyzer = Analyzer::new(store);
    analyzer.parse_stream("first", &first);
    assert_eq!(analyzer.reassembler().pending(), 1);

    analyzer.parse_stream("second", &second);
    assert_eq!(analyzer.reassembler().stats().matched, 1);
}

#[test]
fn completed_pieces_are_not_kept_across_streams() {
    let data = vec![0xa5; 16384];
    let mut store = DescriptorStore::new();
    let info_hash = store
        .insert_torrent(&torrent(16384, 16384, &codec::sha1(&data)))
        .unwrap();

    let buf = stream(info_hash.0, vec![piece(0, 0, &data)]);

    let mut analyzer = Analyzer::new(store);
    for i in 0..50 {
        analyzer.parse_stream(format!("stream-{i}"), &buf);
    }

    let stats = analyzer.reassembler().stats();
    assert_eq!(stats.completed, 50);
    assert_eq!(stats.matched, 50);
    assert_eq!(analyzer.reassembler().pending(), 0);
    assert!(analyzer.reassembler_mut().take_completed().is_empty());
}

#[test]
fn pex_counts() {
    let mut pex = b"d5:added12:".to_vec();
    pex.extend_from_slice(&[1, 1, 1, 1, 0, 1, 2, 2, 2, 2, 0, 2]);
    pex.extend(b"7:added.f2:");
    pex.extend_from_slice(&[0x03, 0x00]);
    pex.extend(b"7:dropped0:e");

    let buf =
        stream([0; 20], vec![ext(0, b"d1:md6:ut_pexi1eee"), ext(1, &pex)]);

    let (_, events, result) = parse(&buf);
    result.unwrap();

    let Extended::Pex(msg) = &events.extended[1] else {
        panic!("expected ut_pex, got {:?}", events.extended[1]);
    };
    assert_eq!(msg.added.len(), 2);
    assert_eq!(msg.prefer_encryption(), 1);
    assert_eq!(msg.seeders(), 1);
    assert!(msg.dropped.is_empty());
}

#[test]
fn metadata_request_after_negotiation() {
    let buf = stream(
        [0; 20],
        vec![
            ext(0, b"d1:md11:ut_metadatai3ee13:metadata_sizei31235ee"),
            ext(3, b"d8:msg_typei0e5:piecei2ee"),
        ],
    );

    let (session, events, result) = parse(&buf);
    result.unwrap();

    let Extended::Handshake(handshake) = &events.extended[0] else {
        panic!("expected the extension handshake");
    };
    assert_eq!(handshake.metadata_size, Some(31235));
    assert_eq!(events.extended[1], Extended::Metadata(MetadataMsg::Request(2)));
    assert_eq!(session.extensions.get(3), Some("ut_metadata"));
}

#[test]
fn register_then_unregister() {
    let buf = stream(
        [0; 20],
        vec![
            ext(0, b"d1:md6:ut_pexi5eee"),
            ext(0, b"d1:md6:ut_pexi0eee"),
            ext(5, b"de"),
            Core::Have(1),
        ],
    );

    let (session, events, result) = parse(&buf);
    result.unwrap();

    assert_eq!(session.extensions.get(5), None);
    // only the two handshakes
    assert_eq!(events.extended.len(), 2);
    assert!(events
        .extended
        .iter()
        .all(|e| matches!(e, Extended::Handshake(_))));
    assert_eq!(events.messages.last(), Some(&Core::Have(1)));
}

#[test]
fn lt_tex_and_upload_only() {
    let buf = stream(
        [0; 20],
        vec![
            ext(0, b"d1:md6:lt_texi2e11:upload_onlyi3eee"),
            ext(2, b"d5:addedl17:http://a/announceee"),
            ext(3, &[0]),
        ],
    );

    let (_, events, result) = parse(&buf);
    result.unwrap();

    let Extended::Tex(tex) = &events.extended[1] else {
        panic!("expected lt_tex");
    };
    assert_eq!(tex.trackers().collect::<Vec<_>>(), vec!["http://a/announce"]);
    assert_eq!(events.extended[2], Extended::UploadOnly(false));
}
