pub mod fake_network;
pub mod mock_tv;
