//! Tests for the market crate.

#[cfg(test)]
mod workflow_tests {
    use crate::{Market, MarketConfig, MarketError, MarketEventKind};
    use filemart_types::{AccessEntry, Amount, BidStatus, FileRecord, Identity, RoleFlags};

    fn id(n: u8) -> Identity {
        Identity::new([n; 20])
    }

    /// Owner `1`, requester `2` funded with 1_000.
    fn market_with_pair() -> (Market, Identity, Identity) {
        let market = Market::new(MarketConfig::default());
        let (owner, requester) = (id(1), id(2));
        market.register_as_data_owner(&owner).unwrap();
        market.register_as_data_requester(&requester).unwrap();
        market.fund(&requester, Amount::new(1_000)).unwrap();
        (market, owner, requester)
    }

    #[test]
    fn test_full_purchase_flow() {
        let (market, a, b) = market_with_pair();
        market.add(&a, "ipfs://h1", "doc.pdf").unwrap();

        let index = market
            .place_bid(&b, &a, Amount::new(100), Amount::new(100))
            .unwrap();
        assert_eq!(index, 0);
        let bid = market.get_bid(0).unwrap();
        assert!(bid.active);
        assert_eq!(market.balance_of(&b), Amount::new(900));
        assert_eq!(market.escrow_balance(), Amount::new(100));

        assert!(matches!(
            market.display(&b, &a),
            Err(MarketError::AccessDenied { .. })
        ));

        let settlement = market.accept_bid(&a, 0).unwrap();
        assert_eq!(settlement.price, Amount::new(100));
        assert_eq!(market.balance_of(&a), Amount::new(100));
        assert_eq!(market.escrow_balance(), Amount::ZERO);
        assert!(!market.get_bid(0).unwrap().active);
        assert!(market.has_access(&a, &b));

        let files = market.display(&b, &a).unwrap();
        assert_eq!(files, vec![FileRecord::new("ipfs://h1", "doc.pdf")]);
    }

    #[test]
    fn test_role_is_fixed_after_registration() {
        let market = Market::new(MarketConfig::default());
        let c = id(3);
        assert_eq!(market.get_role(&c), RoleFlags::default());

        market.register_as_data_requester(&c).unwrap();
        assert_eq!(
            market.get_role(&c),
            RoleFlags {
                is_data_owner: false,
                is_data_requester: true
            }
        );
        assert_eq!(
            market.register_as_data_owner(&c),
            Err(MarketError::AlreadyRegistered { caller: c })
        );
        assert_eq!(
            market.register_as_data_requester(&c),
            Err(MarketError::AlreadyRegistered { caller: c })
        );
        assert!(market.get_role(&c).is_data_requester);
    }

    #[test]
    fn test_unregistered_add_is_unauthorized() {
        let market = Market::new(MarketConfig::default());
        let c = id(9);
        assert!(matches!(
            market.add(&c, "ipfs://x", "x.txt"),
            Err(MarketError::Unauthorized { .. })
        ));
        assert!(market.display(&c, &c).unwrap().is_empty());
        assert!(market.list_all_files().is_empty());
        assert!(market.events().is_empty());
    }

    #[test]
    fn test_requester_cannot_add_files() {
        let (market, _, b) = market_with_pair();
        assert!(matches!(
            market.add(&b, "ipfs://x", "x.txt"),
            Err(MarketError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_zero_bid_rejected() {
        let (market, a, b) = market_with_pair();
        assert!(matches!(
            market.place_bid(&b, &a, Amount::ZERO, Amount::ZERO),
            Err(MarketError::InvalidBid { .. })
        ));
        assert!(market.get_bids().is_empty());
        assert_eq!(market.balance_of(&b), Amount::new(1_000));
    }

    #[test]
    fn test_mismatched_escrow_rejected() {
        let (market, a, b) = market_with_pair();
        assert!(matches!(
            market.place_bid(&b, &a, Amount::new(100), Amount::new(99)),
            Err(MarketError::InvalidBid { .. })
        ));
        assert!(matches!(
            market.place_bid(&b, &a, Amount::new(100), Amount::new(101)),
            Err(MarketError::InvalidBid { .. })
        ));
        assert!(market.get_bids().is_empty());
        assert_eq!(market.escrow_balance(), Amount::ZERO);
    }

    #[test]
    fn test_bid_on_non_owner_rejected() {
        let (market, _, b) = market_with_pair();
        assert!(matches!(
            market.place_bid(&b, &id(7), Amount::new(10), Amount::new(10)),
            Err(MarketError::InvalidBid { .. })
        ));
    }

    #[test]
    fn test_owner_cannot_place_bid() {
        let (market, a, _) = market_with_pair();
        market.register_as_data_owner(&id(5)).unwrap();
        assert!(matches!(
            market.place_bid(&a, &id(5), Amount::new(10), Amount::new(10)),
            Err(MarketError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_unfunded_bid_leaves_no_trace() {
        let (market, a, b) = market_with_pair();
        let err = market
            .place_bid(&b, &a, Amount::new(5_000), Amount::new(5_000))
            .unwrap_err();
        assert!(matches!(err, MarketError::Ledger(_)));
        assert!(market.get_bids().is_empty());
        assert_eq!(market.balance_of(&b), Amount::new(1_000));
        assert_eq!(market.escrow_balance(), Amount::ZERO);
    }

    #[test]
    fn test_accept_is_exactly_once() {
        let (market, a, b) = market_with_pair();
        market
            .place_bid(&b, &a, Amount::new(100), Amount::new(100))
            .unwrap();
        market.accept_bid(&a, 0).unwrap();
        let events_after_first = market.events().len();

        assert_eq!(
            market.accept_bid(&a, 0),
            Err(MarketError::AlreadyInactive { index: 0 })
        );
        assert_eq!(market.balance_of(&a), Amount::new(100));
        assert_eq!(market.balance_of(&b), Amount::new(900));
        assert_eq!(market.share_access(&a), vec![b]);
        assert_eq!(market.events().len(), events_after_first);
    }

    #[test]
    fn test_only_target_owner_accepts() {
        let (market, a, b) = market_with_pair();
        let other_owner = id(4);
        market.register_as_data_owner(&other_owner).unwrap();
        market
            .place_bid(&b, &a, Amount::new(100), Amount::new(100))
            .unwrap();

        for caller in [other_owner, b] {
            assert!(matches!(
                market.accept_bid(&caller, 0),
                Err(MarketError::Unauthorized { .. })
            ));
        }
        assert!(market.get_bid(0).unwrap().active);
        assert_eq!(market.escrow_balance(), Amount::new(100));
        assert!(!market.has_access(&a, &b));
    }

    #[test]
    fn test_unknown_bid_index() {
        let (market, a, _) = market_with_pair();
        assert_eq!(
            market.accept_bid(&a, 42),
            Err(MarketError::BidNotFound { index: 42 })
        );
    }

    #[test]
    fn test_allow_then_disallow_equals_never_granted() {
        let (market, a, b) = market_with_pair();
        market.add(&a, "ipfs://h1", "doc.pdf").unwrap();

        market.allow(&a, &b).unwrap();
        assert_eq!(market.display(&b, &a).unwrap().len(), 1);
        market.disallow(&a, &b).unwrap();

        assert_eq!(
            market.display(&b, &a),
            Err(MarketError::AccessDenied {
                requester: b,
                owner: a
            })
        );
        assert!(market.share_access(&a).is_empty());
        assert_eq!(
            market.get_accessible_data_owners(&b),
            vec![AccessEntry {
                data_owner: a,
                access: false
            }]
        );
    }

    #[test]
    fn test_disallow_is_idempotent() {
        let (market, a, b) = market_with_pair();
        market.disallow(&a, &b).unwrap();
        market.disallow(&a, &b).unwrap();
        assert!(!market.has_access(&a, &b));
        assert_eq!(market.get_accessible_data_owners(&b).len(), 1);
    }

    #[test]
    fn test_only_owners_manage_access() {
        let (market, a, b) = market_with_pair();
        assert!(matches!(
            market.allow(&b, &a),
            Err(MarketError::Unauthorized { .. })
        ));
        assert!(matches!(
            market.disallow(&id(8), &b),
            Err(MarketError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_share_access_reappends_regranted_requester() {
        let (market, a, b) = market_with_pair();
        let (c, d) = (id(3), id(4));

        market.allow(&a, &b).unwrap();
        market.allow(&a, &c).unwrap();
        market.allow(&a, &d).unwrap();
        market.allow(&a, &c).unwrap();
        assert_eq!(market.share_access(&a), vec![b, c, d]);

        market.disallow(&a, &b).unwrap();
        market.allow(&a, &b).unwrap();
        assert_eq!(market.share_access(&a), vec![c, d, b]);
    }

    #[test]
    fn test_reverse_index_keeps_first_touch_order() {
        let market = Market::new(MarketConfig::default());
        let (o1, o2, r) = (id(1), id(2), id(3));
        market.register_as_data_owner(&o1).unwrap();
        market.register_as_data_owner(&o2).unwrap();

        market.disallow(&o2, &r).unwrap();
        market.allow(&o1, &r).unwrap();
        market.allow(&o2, &r).unwrap();
        market.disallow(&o1, &r).unwrap();

        assert_eq!(
            market.get_accessible_data_owners(&r),
            vec![
                AccessEntry {
                    data_owner: o2,
                    access: true
                },
                AccessEntry {
                    data_owner: o1,
                    access: false
                },
            ]
        );
    }

    #[test]
    fn test_list_all_files_exposes_names_in_order() {
        let market = Market::new(MarketConfig::default());
        let (o1, o2, o3) = (id(1), id(2), id(3));
        for owner in [o2, o1, o3] {
            market.register_as_data_owner(&owner).unwrap();
        }
        market.add(&o1, "ipfs://a", "a.txt").unwrap();
        market.add(&o2, "ipfs://b", "b.txt").unwrap();
        market.add(&o1, "ipfs://a", "a.txt").unwrap();
        market.add(&o1, "ipfs://c", "c.txt").unwrap();

        let listings = market.list_all_files();
        let owners: Vec<Identity> = listings.iter().map(|l| l.owner).collect();
        assert_eq!(owners, vec![o2, o1, o3]);
        assert_eq!(listings[0].file_names, vec!["b.txt"]);
        assert_eq!(listings[1].file_names, vec!["a.txt", "a.txt", "c.txt"]);
        assert!(listings[2].file_names.is_empty());
    }

    #[test]
    fn test_owner_always_sees_own_files() {
        let (market, a, b) = market_with_pair();
        market.add(&a, "ipfs://1", "one").unwrap();
        market.add(&a, "ipfs://2", "two").unwrap();
        market.allow(&a, &b).unwrap();
        market.disallow(&a, &b).unwrap();

        let names: Vec<String> = market
            .display(&a, &a)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn test_file_validation_and_capacity() {
        let config = MarketConfig {
            max_files_per_owner: 2,
            max_name_len: 8,
            ..MarketConfig::default()
        };
        let market = Market::new(config);
        let a = id(1);
        market.register_as_data_owner(&a).unwrap();

        assert!(matches!(
            market.add(&a, "", "x"),
            Err(MarketError::InvalidFile { .. })
        ));
        assert!(matches!(
            market.add(&a, "ipfs://x", "much-too-long-name"),
            Err(MarketError::InvalidFile { .. })
        ));
        market.add(&a, "ipfs://1", "one").unwrap();
        market.add(&a, "ipfs://2", "two").unwrap();
        assert_eq!(
            market.add(&a, "ipfs://3", "three"),
            Err(MarketError::CapacityExceeded { owner: a, limit: 2 })
        );
        assert_eq!(market.display(&a, &a).unwrap().len(), 2);
    }

    #[test]
    fn test_min_bid_enforced() {
        let market = Market::new(MarketConfig {
            min_bid: Amount::new(50),
            ..MarketConfig::default()
        });
        let (a, b) = (id(1), id(2));
        market.register_as_data_owner(&a).unwrap();
        market.register_as_data_requester(&b).unwrap();
        market.fund(&b, Amount::new(100)).unwrap();

        assert!(matches!(
            market.place_bid(&b, &a, Amount::new(49), Amount::new(49)),
            Err(MarketError::InvalidBid { .. })
        ));
        assert_eq!(
            market.place_bid(&b, &a, Amount::new(50), Amount::new(50)),
            Ok(0)
        );
    }

    #[test]
    fn test_multiple_bids_are_non_exclusive() {
        let (market, a, b) = market_with_pair();
        let c = id(3);
        market.register_as_data_requester(&c).unwrap();
        market.fund(&c, Amount::new(500)).unwrap();

        market
            .place_bid(&b, &a, Amount::new(100), Amount::new(100))
            .unwrap();
        market
            .place_bid(&c, &a, Amount::new(250), Amount::new(250))
            .unwrap();
        market.accept_bid(&a, 1).unwrap();
        market.accept_bid(&a, 0).unwrap();

        assert_eq!(market.balance_of(&a), Amount::new(350));
        assert_eq!(market.share_access(&a), vec![c, b]);
        assert_eq!(market.get_bids().iter().filter(|b| b.active).count(), 0);
    }

    #[test]
    fn test_withdraw_refunds_escrow() {
        let (market, a, b) = market_with_pair();
        market
            .place_bid(&b, &a, Amount::new(300), Amount::new(300))
            .unwrap();

        assert!(matches!(
            market.withdraw_bid(&a, 0),
            Err(MarketError::Unauthorized { .. })
        ));
        assert_eq!(market.withdraw_bid(&b, 0), Ok(Amount::new(300)));

        let bid = market.get_bid(0).unwrap();
        assert!(!bid.active);
        assert_eq!(bid.status, BidStatus::Withdrawn);
        assert_eq!(market.balance_of(&b), Amount::new(1_000));
        assert_eq!(market.escrow_balance(), Amount::ZERO);

        assert_eq!(
            market.accept_bid(&a, 0),
            Err(MarketError::AlreadyInactive { index: 0 })
        );
        assert_eq!(
            market.withdraw_bid(&b, 0),
            Err(MarketError::AlreadyInactive { index: 0 })
        );
        assert!(!market.has_access(&a, &b));
    }

    #[test]
    fn test_bid_queries_filter_by_party() {
        let (market, a, b) = market_with_pair();
        let other_owner = id(6);
        market.register_as_data_owner(&other_owner).unwrap();
        market
            .place_bid(&b, &a, Amount::new(10), Amount::new(10))
            .unwrap();
        market
            .place_bid(&b, &other_owner, Amount::new(20), Amount::new(20))
            .unwrap();

        assert_eq!(market.bids_for_owner(&a).len(), 1);
        assert_eq!(market.bids_for_owner(&other_owner)[0].index, 1);
        assert_eq!(market.bids_by_requester(&b).len(), 2);
        assert_eq!(market.escrow_balance(), Amount::new(30));
    }

    #[test]
    fn test_events_journal_committed_mutations_only() {
        let (market, a, b) = market_with_pair();
        let _ = market.register_as_data_owner(&a);
        market
            .place_bid(&b, &a, Amount::new(100), Amount::new(100))
            .unwrap();
        market.accept_bid(&a, 0).unwrap();

        let kinds: Vec<&'static str> = market
            .events()
            .iter()
            .map(|event| match event.kind {
                MarketEventKind::RoleRegistered { .. } => "role",
                MarketEventKind::FileAdded { .. } => "file",
                MarketEventKind::AccessChanged { .. } => "access",
                MarketEventKind::BidPlaced { .. } => "placed",
                MarketEventKind::BidAccepted { .. } => "accepted",
                MarketEventKind::BidWithdrawn { .. } => "withdrawn",
                MarketEventKind::Funded { .. } => "funded",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["role", "role", "funded", "placed", "access", "accepted"]
        );
        for (position, event) in market.events().iter().enumerate() {
            assert_eq!(event.sequence, position as u64);
        }
        assert_eq!(market.events_since(4).len(), 2);
    }

    #[test]
    fn test_fund_rejects_escrow_and_zero() {
        let market = Market::new(MarketConfig::default());
        assert!(matches!(
            market.fund(&Identity::ESCROW, Amount::new(1)),
            Err(MarketError::Unauthorized { .. })
        ));
        assert!(matches!(
            market.fund(&id(1), Amount::ZERO),
            Err(MarketError::Ledger(_))
        ));
        assert_eq!(market.total_supply(), Amount::ZERO);
    }
}
